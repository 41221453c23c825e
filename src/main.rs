use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use result_analytics::config::{DatabaseArgs, FilterArgs, PolicyArgs, ServeArgs};
use result_analytics::db::{self, PgStore};
use result_analytics::models::ResultAnalyticsFilters;
use result_analytics::{analytics, report, server};

#[derive(Parser)]
#[command(name = "result-analytics")]
#[command(about = "Program-wise result analytics for the Controller of Examinations", long_about = None)]
struct Cli {
    #[command(flatten)]
    database: DatabaseArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import final marks from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Serve the analytics API
    Serve(ServeArgs),
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        policy: PolicyArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export program summaries as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        policy: PolicyArgs,
        #[arg(long, default_value = "programs.csv")]
        out: PathBuf,
    },
}

async fn connect(args: &DatabaseArgs) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(args.max_connections)
        .connect(&args.database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let pool = connect(&cli.database).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let summary = db::import_csv(&pool, &csv).await?;
            println!(
                "Inserted {} final marks from {}.",
                summary.inserted,
                csv.display()
            );
            for skipped in &summary.skipped {
                println!("- skipped {skipped}");
            }
        }
        Commands::Serve(args) => {
            let state = server::AppState {
                store: Arc::new(PgStore::new(pool)),
                policy: args.policy.policy(),
            };
            server::serve(state, args.bind).await?;
        }
        Commands::Report {
            filters,
            policy,
            out,
        } => {
            let filters = ResultAnalyticsFilters::from(filters);
            let store = PgStore::new(pool);
            let data = analytics::load_dashboard(&store, &filters, &policy.policy()).await?;
            let report = report::build_report(&filters, Utc::now(), &data);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            filters,
            policy,
            out,
        } => {
            let filters = ResultAnalyticsFilters::from(filters);
            let store = PgStore::new(pool);
            let data = analytics::load_dashboard(&store, &filters, &policy.policy()).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let rows = report::write_program_csv(file, &data)?;
            println!("Exported {rows} programs to {}.", out.display());
        }
    }

    Ok(())
}
