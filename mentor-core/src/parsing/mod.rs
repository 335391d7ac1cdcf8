//! Structured Output Parsing
//!
//! Turns semi-structured model replies into validated domain records.
//!
//! # Strategies
//!
//! - **Heading**: `# Title` plus `## Section` Markdown, fence-aware
//! - **Fenced JSON**: the first ```json block, with trailing-comma repair
//! - **Loose JSON**: the first balanced `{...}` in the reply
//!
//! # Example
//!
//! ```rust,ignore
//! use mentor_core::parsing::{RecordSchema, ResponseParser};
//!
//! let parser = ResponseParser::new(config.parser.clone(), store)?;
//! let parsed = parser.parse(&reply, &RecordSchema::Challenge).await?;
//! println!("{} via {}", parsed.record.kind(), parsed.strategy);
//! ```

mod json;
mod markdown;
mod parser;
mod response;

pub use json::{FencedJsonStrategy, LooseJsonStrategy};
pub use markdown::{HeadingStrategy, MarkdownParser, MarkdownSection, comma_items, list_items};
pub use parser::{
    ExtractedFields, ExtractionStrategy, ParseError, ParseResult, essential_fields,
    missing_essentials,
};
pub use response::{ParsedResponse, RecordSchema, ResponseParser};
