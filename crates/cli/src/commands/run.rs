//! `ticketforge run` — implement one ticket inside a working directory.

use std::path::PathBuf;
use ticketforge_agent::{Orchestrator, OrchestratorConfig, derive_branch_name, fallback};
use ticketforge_config::AppConfig;
use ticketforge_tools::{ToolDispatcher, repo_context};
use tracing::{error, info};

pub struct RunArgs {
    pub ticket: Option<PathBuf>,
    pub workspace: PathBuf,
    pub context: Option<PathBuf>,
    pub json: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let ticket = super::read_ticket(args.ticket.as_deref())?;

    let dispatcher =
        ToolDispatcher::new(&args.workspace)?.with_search_settings(config.search.clone());

    let repo_context = match &args.context {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read context file {}: {e}", path.display()))?,
        None => match dispatcher.root() {
            Some(root) => {
                repo_context::repository_listing(root.path(), repo_context::DEFAULT_MAX_FILES)
            }
            None => String::new(),
        },
    };

    let orchestrator_config = OrchestratorConfig::from(&config);
    info!(
        workspace = %args.workspace.display(),
        model = %orchestrator_config.model,
        "Starting run"
    );

    let result = match ticketforge_providers::build_from_config(&config) {
        Ok(provider) => {
            Orchestrator::new(provider, dispatcher, orchestrator_config)
                .run(&ticket, &repo_context)
                .await
        }
        Err(e) => {
            error!(error = %e, "Model service unavailable, producing notes only");
            fallback::error_result(
                &dispatcher,
                &orchestrator_config.notes_file,
                &ticket,
                &e.to_string(),
            )
            .await
        }
    };

    let branch = derive_branch_name(&result.analysis, &ticket, &config.agent.branch_prefix);
    info!(branch = %branch, changes = result.changes.len(), "Run finished");

    if args.json {
        let out = serde_json::json!({ "branch": branch, "result": result });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Branch: {branch}\n");
        println!("# {}\n", result.analysis.title);
        print!("{}", result.review_body());
    }

    Ok(())
}
