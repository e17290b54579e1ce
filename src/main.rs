//! KinoWeek - weekly cinema, theatre and concert digest.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use kinoweek::config::AppConfig;
use kinoweek::models::TIMEZONE;
use kinoweek::{list_sources, run, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "kinoweek")]
#[command(about = "Collect this week's screenings and concerts and post the digest", long_about = None)]
struct Args {
    /// Write the exports locally instead of posting to Telegram.
    #[arg(long)]
    local: bool,

    /// Config file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory, overriding the config file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run a single source by name.
    #[arg(long)]
    source: Option<String>,

    /// Print the known sources and exit.
    #[arg(long)]
    list_sources: bool,

    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        if let Err(err) = dotenvy::from_path(&args.dotenv) {
            eprintln!("failed to load {}: {err}", args.dotenv);
            return ExitCode::FAILURE;
        }
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::select! {
        result = execute(args) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "run failed");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("run interrupted");
            ExitCode::from(130)
        }
    }
}

async fn execute(args: Args) -> anyhow::Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    if args.list_sources {
        for source in list_sources(&config)? {
            let cap = source
                .max_events
                .map_or_else(|| "-".to_string(), |max| max.to_string());
            println!(
                "{:<18} {:<8} {:<8} {:>4}  {} <{}>",
                source.name,
                source.kind.as_str(),
                if source.enabled { "enabled" } else { "disabled" },
                cap,
                source.display_name,
                source.url
            );
        }
        return Ok(());
    }

    let options = RunOptions {
        local_only: args.local,
        only_source: args.source,
    };
    let now = chrono::Utc::now().with_timezone(&TIMEZONE);
    let outcome = run(&config, &options, now).await?;

    if options.local_only {
        println!("\n{}\n", outcome.message);
    }
    if let Some(id) = outcome.message_id {
        tracing::info!(message_id = id, "digest delivered");
    }
    Ok(())
}
