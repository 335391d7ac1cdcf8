//! Personas: named response styles applied to composed prompts

use serde::{Deserialize, Serialize};

/// A named feedback/response style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub style: String,
    pub tone: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, style: impl Into<String>, tone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            style: style.into(),
            tone: tone.into(),
        }
    }

    /// Look up a built-in persona by its kebab-case key
    pub fn preset(key: &str) -> Option<Self> {
        let persona = match key {
            "encouraging-mentor" => Self::new(
                "an encouraging programming mentor",
                "celebrates progress before pointing at gaps and always ends with a next step",
                "warm and upbeat",
            ),
            "socratic-guide" => Self::new(
                "a Socratic programming tutor",
                "asks guiding questions instead of handing out answers",
                "patient and curious",
            ),
            "strict-reviewer" => Self::new(
                "a senior code reviewer",
                "holds submissions to production standards and is specific about every defect",
                "direct and concise",
            ),
            _ => return None,
        };
        Some(persona)
    }

    /// Keys accepted by [`Persona::preset`]
    pub fn preset_keys() -> &'static [&'static str] {
        &["encouraging-mentor", "socratic-guide", "strict-reviewer"]
    }

    pub(crate) fn preamble(&self) -> String {
        format!(
            "You are {}. Your style: {}. Your tone: {}.",
            self.name, self.style, self.tone
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_key_resolves() {
        for key in Persona::preset_keys() {
            assert!(Persona::preset(key).is_some(), "{} missing", key);
        }
        assert!(Persona::preset("pirate").is_none());
    }

    #[test]
    fn test_preamble_mentions_all_fields() {
        let preamble = Persona::new("Ada", "Socratic", "warm").preamble();
        assert_eq!(preamble, "You are Ada. Your style: Socratic. Your tone: warm.");
    }
}
