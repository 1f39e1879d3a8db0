use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_segments::dataset::Dataset;
use loyalty_segments::ids::IdSequence;
use loyalty_segments::model::SegmentModel;
use loyalty_segments::validation::ImportValidator;
use loyalty_segments::{csv_source, db, report};
use loyalty_segments::{EngineConfig, Midpoint, ScalePair, ScaleRange};

const DEFAULT_SCALE: &str = "1-5";

#[derive(Parser)]
#[command(name = "loyalty-segments")]
#[command(about = "Satisfaction x loyalty customer segmentation", long_about = None)]
struct Cli {
    /// Satisfaction scale, e.g. 1-5 (overrides SEGMENTS_SATISFACTION_SCALE)
    #[arg(long, global = true)]
    satisfaction_scale: Option<ScaleRange>,
    /// Loyalty scale, e.g. 0-10 (overrides SEGMENTS_LOYALTY_SCALE)
    #[arg(long, global = true)]
    loyalty_scale: Option<ScaleRange>,
    /// Extra flag tokens, applied after SEGMENTS_FLAGS
    #[arg(long = "flag", global = true)]
    flags: Vec<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Validate a CSV of survey responses and store the accepted rows
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "Satisfaction")]
        satisfaction_column: String,
        #[arg(long, default_value = "Loyalty")]
        loyalty_column: String,
        /// Write the rejected rows and warnings as JSON
        #[arg(long)]
        rejected_out: Option<PathBuf>,
        /// Write a markdown report of stored plus accepted records and the validation summary
        #[arg(long)]
        report_out: Option<PathBuf>,
        /// Validate without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the segment mix and boundary proximity of stored records
    Classify {
        /// Midpoint as "satisfaction,loyalty"
        #[arg(long)]
        midpoint: Option<String>,
        /// Print the distribution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        midpoint: Option<String>,
        #[arg(long, default_value = "Stored responses")]
        title: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Soft delete every stored entry for a customer
    Exclude {
        #[arg(long)]
        id: String,
        /// Bring the entries back instead
        #[arg(long)]
        restore: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loyalty_segments=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let scales = resolve_scales(&cli)?;
    let mut config = resolve_config(&cli)?;

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import {
            csv,
            satisfaction_column,
            loyalty_column,
            rejected_out,
            report_out,
            dry_run,
        } => {
            let table = csv_source::load_table_file(&csv)?;
            let existing = db::fetch_records(&pool).await?;
            let mut ids = IdSequence::seeded_from(config.id_prefix.as_str(), &existing);

            let validator = ImportValidator::new(
                satisfaction_column,
                loyalty_column,
                scales,
                Utc::now().date_naive(),
            )
            .with_date_format(config.date_format);
            let outcome = validator.validate(&table, &existing, &mut ids)?;

            if let Some(path) = rejected_out {
                let json = serde_json::to_string_pretty(&outcome.report)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Validation report written to {}.", path.display());
            }

            println!(
                "{} accepted, {} rejected, {} warnings, {} skipped rows.",
                outcome.records.len(),
                outcome.report.rejected.len(),
                outcome.report.warnings.len(),
                outcome.skipped_rows
            );
            for entry in outcome.report.rejected.iter().take(10) {
                println!("- Row {}: {}", entry.row, entry.reason);
            }

            if let Some(path) = report_out {
                let mut dataset = Dataset::new(scales, existing, &config.id_prefix);
                dataset.extend(outcome.records.clone());
                let model = SegmentModel::new(dataset, config.clone())?;
                let report = report::build_report(
                    &format!("import of {}", csv.display()),
                    model.geometry(),
                    &model.distribution(),
                    &model.proximity(),
                    Some(&outcome.report),
                );
                std::fs::write(&path, report)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Report written to {}.", path.display());
            }

            if dry_run {
                println!("Dry run: nothing stored.");
            } else {
                let inserted = db::insert_records(&pool, &outcome.records).await?;
                println!("Inserted {inserted} records from {}.", csv.display());
            }
        }
        Commands::Classify { midpoint, json } => {
            apply_midpoint(&mut config, midpoint.as_deref())?;
            let model = load_model(&pool, scales, config).await?;
            let distribution = model.distribution();

            if json {
                println!("{}", serde_json::to_string_pretty(&distribution)?);
                return Ok(());
            }

            if distribution.active_total == 0 {
                println!("No active records.");
                return Ok(());
            }

            println!("Segment mix across {} records:", distribution.active_total);
            for (segment, tally) in &distribution.segments {
                println!("- {segment}: {} ({:.1}%)", tally.count, tally.percentage);
            }

            let proximity = model.proximity();
            println!("Boundary proximity (threshold {}):", proximity.threshold);
            for (bucket, tally) in &proximity.boundaries {
                println!("- {bucket}: {} ({:.1}%)", tally.count, tally.percentage);
            }
            for (bucket, tally) in &proximity.corners {
                println!("- {bucket}: {} ({:.1}%)", tally.count, tally.percentage);
            }
        }
        Commands::Report {
            midpoint,
            title,
            out,
        } => {
            apply_midpoint(&mut config, midpoint.as_deref())?;
            let model = load_model(&pool, scales, config).await?;
            let report = report::build_report(
                &title,
                model.geometry(),
                &model.distribution(),
                &model.proximity(),
                None,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Exclude { id, restore } => {
            let touched = db::set_excluded(&pool, &id, !restore).await?;
            if touched == 0 {
                println!("No stored entries for {id}.");
            } else if restore {
                println!("Restored {touched} entries for {id}.");
            } else {
                println!("Excluded {touched} entries for {id}.");
            }
        }
    }

    Ok(())
}

fn resolve_scales(cli: &Cli) -> anyhow::Result<ScalePair> {
    let satisfaction = match cli.satisfaction_scale {
        Some(scale) => scale,
        None => scale_from_env("SEGMENTS_SATISFACTION_SCALE")?,
    };
    let loyalty = match cli.loyalty_scale {
        Some(scale) => scale,
        None => scale_from_env("SEGMENTS_LOYALTY_SCALE")?,
    };
    Ok(ScalePair::new(satisfaction, loyalty))
}

fn scale_from_env(key: &str) -> anyhow::Result<ScaleRange> {
    let raw = std::env::var(key).unwrap_or_else(|_| DEFAULT_SCALE.to_string());
    ScaleRange::parse(&raw).with_context(|| format!("{key} is not a valid scale"))
}

fn resolve_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let env_flags = std::env::var("SEGMENTS_FLAGS").unwrap_or_default();
    let tokens = env_flags
        .split(|c: char| c == ';' || c.is_whitespace())
        .chain(cli.flags.iter().map(String::as_str));
    EngineConfig::from_tokens(tokens).context("invalid segment flags")
}

fn apply_midpoint(config: &mut EngineConfig, midpoint: Option<&str>) -> anyhow::Result<()> {
    if let Some(raw) = midpoint {
        let (satisfaction, loyalty) = Midpoint::parse_pair(raw)?;
        config.midpoint.initial = Some(Midpoint {
            satisfaction,
            loyalty,
        });
    }
    Ok(())
}

async fn load_model(
    pool: &PgPool,
    scales: ScalePair,
    config: EngineConfig,
) -> anyhow::Result<SegmentModel> {
    let records = db::fetch_records(pool).await?;
    let dataset = Dataset::new(scales, records, &config.id_prefix);
    let model = SegmentModel::new(dataset, config)?;

    let violations = model.scale_violations(&scales);
    if let Some(first) = violations.first() {
        anyhow::bail!(
            "{} stored records fall outside {} x {} (first: {}: {}); pass the scales they were imported with",
            violations.len(),
            scales.satisfaction,
            scales.loyalty,
            first.id,
            first.reason
        );
    }
    Ok(model)
}
