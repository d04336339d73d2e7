use anyhow::Context;
use clap::{Parser, Subcommand};
use inmo_core::config::Settings;
use inmo_core::report;
use inmo_core::storage::{clients, valuations};
use inmo_core::time::season::resolve_as_of_date;
use inmo_core::valuation::compute_valuation;
use inmo_core::valuation::renovation::propose_renovation;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod input;

#[derive(Debug, Parser)]
#[command(name = "inmo_worker", about = "Offline valuation and report jobs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations.
    Migrate,

    /// Value the property described in a JSON request file and print the result.
    Value {
        #[arg(long)]
        input: PathBuf,

        /// Valuation date (YYYY-MM-DD). Defaults to today's date in Madrid.
        #[arg(long)]
        as_of_date: Option<String>,

        /// Also persist the valuation.
        #[arg(long)]
        store: bool,
    },

    /// Render the PDF report of a stored valuation.
    Report {
        #[arg(long)]
        valuation_id: i64,
        #[arg(long)]
        out: PathBuf,
    },

    /// Render a client's portfolio report.
    Portfolio {
        #[arg(long)]
        client_id: i64,
        #[arg(long)]
        out: PathBuf,
    },

    /// Build a renovation proposal from a JSON request file and render it as PDF.
    Renovation {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        as_of_date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Err(err) = run(args.command, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "worker command failed");
        return Err(err);
    }
    Ok(())
}

async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Command::Migrate => {
            let pool = connect(settings).await?;
            inmo_core::storage::migrate(&pool).await?;
            tracing::info!("migrations applied");
        }
        Command::Value {
            input,
            as_of_date,
            store,
        } => {
            let as_of = resolve_as_of_date(as_of_date.as_deref(), chrono::Utc::now())?;
            let valuation_input = input::read_valuation_input(&input)?;

            let started = Instant::now();
            let result = compute_valuation(&valuation_input, as_of);
            let processing_time = started.elapsed().as_secs_f64();

            if store {
                let pool = connect(settings).await?;
                let stored =
                    valuations::insert_valuation(&pool, &valuation_input, &result, processing_time)
                        .await?;
                tracing::info!(valuation_id = stored.id, status = %stored.status, "valuation stored");
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Report { valuation_id, out } => {
            let pool = connect(settings).await?;
            let valuation = valuations::get_valuation(&pool, valuation_id)
                .await?
                .with_context(|| format!("valuation {valuation_id} not found"))?;
            report::write_valuation_report(&valuation, &out, chrono::Utc::now())?;
            tracing::info!(valuation_id, out = %out.display(), "valuation report written");
        }
        Command::Portfolio { client_id, out } => {
            let pool = connect(settings).await?;
            let portfolio = clients::get_portfolio(&pool, client_id)
                .await?
                .with_context(|| format!("client {client_id} not found"))?;
            report::write_portfolio_report(&portfolio, &out, chrono::Utc::now())?;
            tracing::info!(client_id, out = %out.display(), "portfolio report written");
        }
        Command::Renovation {
            input,
            out,
            as_of_date,
        } => {
            let as_of = resolve_as_of_date(as_of_date.as_deref(), chrono::Utc::now())?;
            let valuation_input = input::read_renovation_input(&input)?;
            let result = compute_valuation(&valuation_input, as_of);
            let figures = result
                .figures
                .with_context(|| format!("valuation failed: {}", result.error.unwrap_or_default()))?;
            let proposal = propose_renovation(&valuation_input, &figures);
            report::write_renovation_report(&valuation_input, &proposal, &out, chrono::Utc::now())?;
            tracing::info!(out = %out.display(), "renovation proposal written");
            println!("{}", serde_json::to_string_pretty(&proposal)?);
        }
    }
    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
