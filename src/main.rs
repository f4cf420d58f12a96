use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

mod assigner;
mod config;
mod import;
mod merger;
mod models;
mod pipeline;
mod report;
mod sectioner;
mod store;

use config::{DatabaseConfig, LetterScope, SchedulingRules};
use pipeline::RunSummary;
use store::{MemoryStore, PgStore, ReferenceTable, TimetableStore};

#[derive(Parser)]
#[command(name = "timetable-forge")]
#[command(about = "Sections, merges and schedules university course offerings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Replace one reference table from a CSV file
    Import {
        #[arg(long, value_enum)]
        table: ReferenceTable,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Verify every reference table has rows
    Check,
    /// Split enrollment forecasts into program sections
    Section,
    /// Merge program sections into course sections for one semester
    Merge {
        #[arg(long)]
        semester: i32,
        #[arg(long, value_enum, default_value_t = LetterScope::PerDepartment)]
        letters: LetterScope,
    },
    /// Assign rooms, days and times to the semester's course sections
    Assign {
        #[arg(long)]
        semester: i32,
    },
    /// Run all three stages against the database
    Run {
        #[arg(long)]
        semester: i32,
        #[arg(long, value_enum, default_value_t = LetterScope::PerDepartment)]
        letters: LetterScope,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Run all three stages in memory from a directory of CSV files
    Simulate {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        semester: i32,
        #[arg(long, value_enum, default_value_t = LetterScope::PerDepartment)]
        letters: LetterScope,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Generate a markdown timetable report from the stored assignments
    Report {
        #[arg(long, default_value = "timetable.md")]
        out: PathBuf,
    },
}

async fn connect() -> anyhow::Result<PgStore> {
    let config = DatabaseConfig::from_env()?;
    let store = PgStore::connect(&config)
        .await
        .context("failed to connect to Postgres")?;
    if !store.health_check().await? {
        bail!("Postgres did not answer the health check");
    }
    Ok(store)
}

async fn ensure_ready(store: &dyn TimetableStore) -> anyhow::Result<()> {
    let readiness = pipeline::check_readiness(store).await?;
    if !readiness.is_ready() {
        let table = readiness.first_empty.unwrap_or_default();
        bail!("{table} table is empty; import it before scheduling");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Sectioned {} forecast rows into {} program sections ({} students).",
        summary.sectioning.forecast_rows,
        summary.sectioning.program_sections,
        summary.sectioning.students
    );
    println!(
        "Merged {} catalog rows into {} course sections.",
        summary.merging.catalog_rows, summary.merging.course_sections
    );
    print_assignment(&summary.assignment);
}

fn print_assignment(summary: &pipeline::AssignmentSummary) {
    println!(
        "Run {}: {} scheduled, {} unscheduled.",
        summary.run_id,
        summary.scheduled,
        summary.unscheduled_count()
    );
    for item in &summary.unscheduled {
        println!("- {} ({}): {}", item.course_section, item.course_type, item.reason);
    }
}

async fn finish_run(
    store: &dyn TimetableStore,
    summary: &RunSummary,
    json: bool,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print_summary(summary);
    }

    if let Some(path) = report_path {
        let assignments = store.fetch_assignments().await?;
        let report = report::build_report(Some(summary), &assignments);
        std::fs::write(path, report)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report written to {}.", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let store = connect().await?;
            store.init_schema().await?;
            println!("Schema ready.");
        }
        Commands::Import { table, csv } => {
            let data = import::read_table_file(table, &csv)?;
            let store = connect().await?;
            store.replace_reference_data(&data).await?;
            let counts = store.table_counts().await?;
            for (name, rows) in counts.entries() {
                println!("{name}: {rows} rows");
            }
            println!("Imported {}.", csv.display());
        }
        Commands::Check => {
            let store = connect().await?;
            let readiness = pipeline::check_readiness(&store).await?;
            for (name, rows) in readiness.counts.entries() {
                println!("{name}: {rows} rows");
            }
            if !readiness.is_ready() {
                bail!("{} table is empty", readiness.first_empty.unwrap_or_default());
            }
            println!("All reference tables are populated.");
        }
        Commands::Section => {
            let store = connect().await?;
            ensure_ready(&store).await?;
            let summary = pipeline::run_sectioning(&store, &SchedulingRules::default()).await?;
            println!(
                "Created {} program sections from {} forecast rows.",
                summary.program_sections, summary.forecast_rows
            );
        }
        Commands::Merge { semester, letters } => {
            let store = connect().await?;
            let rules = SchedulingRules::default().with_letter_scope(letters);
            let summary = pipeline::run_merging(&store, semester, &rules).await?;
            println!(
                "Created {} course sections for semester {semester} ({} catalog rows had no program sections).",
                summary.course_sections, summary.skipped_cross_references
            );
        }
        Commands::Assign { semester } => {
            let store = connect().await?;
            ensure_ready(&store).await?;
            let summary =
                pipeline::run_assignment(&store, semester, &SchedulingRules::default()).await?;
            print_assignment(&summary);
            let decisions = store.fetch_decisions().await?;
            println!("Decision log holds {} rows.", decisions.len());
        }
        Commands::Run {
            semester,
            letters,
            json,
            report,
        } => {
            let store = connect().await?;
            ensure_ready(&store).await?;
            let rules = SchedulingRules::default().with_letter_scope(letters);
            let summary = pipeline::run_all(&store, semester, &rules).await?;
            finish_run(&store, &summary, json, report.as_deref()).await?;
        }
        Commands::Simulate {
            data_dir,
            semester,
            letters,
            json,
            report,
        } => {
            let reference = import::read_directory(&data_dir)?;
            let store = MemoryStore::with_reference(reference);
            ensure_ready(&store).await?;
            let rules = SchedulingRules::default().with_letter_scope(letters);
            let summary = pipeline::run_all(&store, semester, &rules).await?;
            finish_run(&store, &summary, json, report.as_deref()).await?;
        }
        Commands::Report { out } => {
            let store = connect().await?;
            let assignments = store.fetch_assignments().await?;
            let report = report::build_report(None, &assignments);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
