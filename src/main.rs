//! convo-steps - inspect and edit recorded conversation steps

use agent_convo::db::Database;
use agent_convo::ReplayConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "convo-steps", about = "Inspect recorded agent conversation steps")]
struct Cli {
    /// Path to the step database
    #[arg(long, env = "CONVO_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Project whose steps to operate on
    #[arg(long, env = "CONVO_PROJECT_ID")]
    project: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List recorded steps in recording order
    List {
        /// Include steps of every project
        #[arg(long)]
        all: bool,
    },
    /// Print one step's messages and response as JSON
    Show { id: i64 },
    /// Delete steps recorded after a step
    Truncate {
        #[arg(long)]
        after: i64,
    },
    /// Delete steps that are not on a step's branch
    Prune {
        #[arg(long)]
        keep: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_convo=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ReplayConfig::from_env();
    if let Some(path) = cli.db_path {
        config.db_path = Some(path);
    }
    if let Some(project) = cli.project {
        config.project_id = project;
    }

    let db_path = config.db_path_or_default();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::debug!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path)?;

    match cli.command {
        Command::List { all } => {
            let project = (!all).then_some(config.project_id.as_str());
            for step in db.list_steps(project)? {
                let hash: String = step.hash_id.chars().take(12).collect();
                println!(
                    "{:>6}  {hash}  {:<24}  req={:<4} prev={}  {}",
                    step.id,
                    step.prompt_path.as_deref().unwrap_or("-"),
                    step.llm_req_num,
                    step.previous_step
                        .map_or_else(|| "-".to_string(), |id| id.to_string()),
                    step.high_level_step,
                );
            }
        }
        Command::Show { id } => {
            let step = db.get_step(id)?;
            println!("{}", serde_json::to_string_pretty(&step)?);
        }
        Command::Truncate { after } => {
            let deleted = db.delete_steps_after(&config.project_id, after)?;
            tracing::info!(project = %config.project_id, after, deleted, "Truncated steps");
            println!("Deleted {deleted} step(s) after {after}");
        }
        Command::Prune { keep } => {
            let deleted = db.delete_steps_off_branch(&config.project_id, keep)?;
            tracing::info!(project = %config.project_id, keep, deleted, "Pruned steps");
            println!("Deleted {deleted} step(s) off the branch of {keep}");
        }
    }

    Ok(())
}
