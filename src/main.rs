use clap::Parser;
use confluence::application::analyze::{AnalysisFailure, AnalysisRequest, PanelRequest};
use confluence::cli::commands::{Cli, Commands};
use confluence::cli::report::{FailureReport, PanelReport, RunReport};
use confluence::config::EngineConfig;
use confluence::Confluence;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("confluence=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let engine = match EngineConfig::from_env().and_then(|config| Confluence::new(&config)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error initializing Confluence: {e}");
            std::process::exit(1);
        }
    };

    let result = run_command(engine, cli.command).await;
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(engine: Confluence, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Analyze {
            subject,
            expert,
            force,
        } => {
            let request = AnalysisRequest {
                subject_key: subject,
                expert_key: expert,
                force,
            };
            let run = match engine.analyze(&request).await {
                Ok(run) => run,
                Err(failure) => return Err(report_failure(failure)),
            };
            if run.reused {
                tracing::info!(id = %run.id, "returned stored analysis");
            }
            println!("{}", serde_json::to_string_pretty(&RunReport::from(&run))?);
        }
        Commands::Panel { subject, experts } => {
            let request = PanelRequest::new(subject, experts);
            let panel = match engine.panel(&request).await {
                Ok(panel) => panel,
                Err(failure) => return Err(report_failure(failure)),
            };
            println!("{}", serde_json::to_string_pretty(&PanelReport::from(&panel))?);
        }
        Commands::History { subject, limit } => {
            let analyses = engine.history(&subject, Some(limit))?;
            println!("{}", serde_json::to_string_pretty(&analyses)?);
        }
        Commands::Recent { limit } => {
            let analyses = engine.recent(Some(limit))?;
            println!("{}", serde_json::to_string_pretty(&analyses)?);
        }
        Commands::Show { id } => {
            let analysis = engine.get(&id)?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Delete { id } => {
            engine.delete(&id)?;
            println!("Analysis {id} deleted");
        }
        Commands::Stats => {
            let stats = engine.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::PurgeCache => {
            let removed = engine.purge_cache()?;
            println!("Removed {removed} expired cache entries");
        }
    }
    Ok(())
}

/// Print the failure as JSON on stdout and hand it back for the exit status.
fn report_failure(failure: AnalysisFailure) -> Box<dyn std::error::Error> {
    match serde_json::to_string_pretty(&FailureReport::from(&failure)) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "could not encode failure report"),
    }
    Box::new(failure)
}
