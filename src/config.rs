use anyhow::Context;
use clap::ValueEnum;
use serde::Serialize;

/// How course-section letter suffixes are counted during merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
pub enum LetterScope {
    /// The counter restarts for every department teaching the same course and year.
    #[default]
    PerDepartment,
    /// One counter per course code and year across all departments.
    PerCourse,
}

/// Limits shared by all three stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulingRules {
    pub section_cap: u32,
    pub min_break_minutes: u32,
    pub max_chain_minutes: u32,
    pub letter_scope: LetterScope,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            section_cap: 40,
            min_break_minutes: 80,
            max_chain_minutes: 170,
            letter_scope: LetterScope::PerDepartment,
        }
    }
}

impl SchedulingRules {
    pub fn with_letter_scope(mut self, letter_scope: LetterScope) -> Self {
        self.letter_scope = letter_scope;
        self
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a Postgres instance")?;
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {value}"))?,
            Err(_) => 5,
        };
        Ok(Self {
            url,
            max_connections,
        })
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
