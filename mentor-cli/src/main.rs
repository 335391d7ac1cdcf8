//! Mentor CLI - Command-line front end for the tutoring pipeline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use mentor_core::prelude::*;

#[derive(Parser)]
#[command(name = "mentor")]
#[command(about = "Mentor tutoring pipeline CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to mentor.toml plus MENTOR_* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Teacher's notes commands
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    /// Generate the next challenge
    Challenge {
        /// Topic to focus on (repeatable)
        #[arg(short, long = "topic")]
        topics: Vec<String>,
        /// Requested difficulty (1-10)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=10))]
        difficulty: Option<u8>,
        /// Programming language
        #[arg(short, long)]
        language: Option<String>,
        /// Ask for a multiple-choice variant
        #[arg(long)]
        multiple_choice: bool,
    },
    /// Review a submission for a stored challenge
    Feedback {
        /// Challenge id, e.g. CC-001
        #[arg(short, long)]
        challenge: String,
        /// File containing the submission
        file: PathBuf,
        /// Programming language of the submission
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Answer a student's letter
    Letter {
        /// Letter text; read from --file when omitted
        text: Option<String>,
        /// File containing the letter
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Print the notes document or one section
    Show {
        /// snapshot, recent-activity or history
        #[arg(short, long)]
        section: Option<MemorySection>,
    },
    /// Add text to a section
    Append {
        /// snapshot, recent-activity or history
        section: MemorySection,
        /// Text to add
        text: String,
        /// Replace the section instead of appending
        #[arg(long)]
        overwrite: bool,
    },
    /// Empty one section, or the whole document
    Reset {
        /// snapshot, recent-activity or history
        #[arg(short, long)]
        section: Option<MemorySection>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<MentorConfig> {
    let config = match path {
        Some(path) => MentorConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MentorConfig::load()?,
    };
    tracing::debug!(
        provider = ?config.llm.as_ref().map(|llm| llm.provider),
        notes = %config.memory.path.display(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Memory store for the notes commands; AI summaries only when a provider is
/// configured
fn memory_store(config: &MentorConfig) -> Result<MemoryStore> {
    let invoker = LLMProviderFactory::from_config(config.llm.as_ref())?.map(|provider| {
        ResilientInvoker::new(provider)
            .with_policy(config.retry.clone())
            .with_config(LLMConfig::new().with_temperature(config.generation.summary_temperature))
    });
    Ok(MemoryStore::from_config(&config.memory, invoker))
}

fn report<T>(generated: &Generated<T>) {
    eprintln!("Saved as {} (parsed via {})", generated.key, generated.strategy);
    for warning in &generated.warnings {
        eprintln!("warning: {}", warning);
    }
}

async fn run_memory(config: &MentorConfig, command: MemoryCommands) -> Result<()> {
    let store = memory_store(config)?;
    match command {
        MemoryCommands::Show { section } => match section {
            Some(section) => println!("{}", store.read_section(section).await?),
            None => print!("{}", store.render().await?),
        },
        MemoryCommands::Append {
            section,
            text,
            overwrite,
        } => {
            let mode = if overwrite {
                SectionMode::Overwrite
            } else {
                SectionMode::Append
            };
            store.update(section, &text, mode).await?;
            println!("Updated {} in {}", section, store.path().display());
        }
        MemoryCommands::Reset { section } => {
            match section {
                Some(section) => store.reset_section(section).await?,
                None => store.reset().await?,
            }
            println!("Reset {}", store.path().display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config;

    match cli.command {
        Commands::Version => {
            println!("mentor {}", env!("CARGO_PKG_VERSION"));
            println!("mentor-core {}", mentor_core::VERSION);
        }
        Commands::Memory { command } => {
            let config = load_config(config_path.as_ref())?;
            run_memory(&config, command).await?
        }
        Commands::Challenge {
            topics,
            difficulty,
            language,
            multiple_choice,
        } => {
            let config = load_config(config_path.as_ref())?;
            let tutor = Tutor::builder().config(config).build()?;
            let request = ChallengeRequest {
                topics,
                difficulty,
                language,
                multiple_choice,
            };
            let generated = tutor.generate_challenge(&request).await?;
            report(&generated);
            print!("{}", generated.record.to_markdown());
        }
        Commands::Feedback {
            challenge,
            file,
            language,
        } => {
            let config = load_config(config_path.as_ref())?;
            let records = Arc::new(DirectoryRecordStore::new(config.records.data_dir.clone()));
            let challenge = records
                .load(RecordKind::Challenge, &challenge)
                .await?
                .into_challenge()
                .context("stored record is not a challenge")?;
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let submission = Submission {
                challenge_id: challenge.id.clone(),
                content,
                language,
            };

            let tutor = Tutor::builder().config(config).records(records).build()?;
            let generated = tutor.generate_feedback(&challenge, &submission).await?;
            report(&generated);
            print!("{}", generated.record.to_markdown());
        }
        Commands::Letter { text, file } => {
            let letter = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("reading {}", file.display()))?,
                (None, None) => anyhow::bail!("provide the letter text or --file"),
            };

            let config = load_config(config_path.as_ref())?;
            let tutor = Tutor::builder().config(config).build()?;
            let generated = tutor.process_letter(&letter).await?;
            report(&generated);
            println!("{}", generated.record.to_json()?);
        }
    }

    Ok(())
}
