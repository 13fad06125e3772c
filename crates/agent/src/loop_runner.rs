//! The Orchestrator — drives one ticket through the tool-use loop.
//!
//! PLANNING seeds the transcript; each iteration then prunes, calls the
//! model, and dispatches whatever tools it asked for (in order, gated by the
//! budget) before calling again. The loop ends when the model replies
//! without tool calls or the iteration ceiling is hit. Whatever happens, the
//! run yields a [`RunResult`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use ticketforge_config::AppConfig;
use ticketforge_core::error::{Error, ProviderError};
use ticketforge_core::message::{Message, MessageToolCall, Transcript};
use ticketforge_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use ticketforge_core::ticket::{CodeChange, RunResult};
use ticketforge_core::tool::ToolCall;
use ticketforge_tools::{ToolDispatcher, ToolOutput, ToolRequest};
use tracing::{debug, error, info, warn};

use crate::budget::{BudgetLimits, BudgetState};
use crate::fallback;
use crate::metadata::{extract_keywords, extract_ticket_number};
use crate::prompt::{KICKOFF, RATE_LIMIT_DIRECTIVE, SeedPrompt, TOOL_BUDGET_DIRECTIVE, truncate_context};
use crate::pruner::prune;
use crate::summary::{FinalSummary, build_analysis, parse_summary};

/// Smallest output limit used for the rate-limit retry.
const MIN_RETRY_TOKENS: u32 = 256;

/// Everything one run needs besides the provider and the working directory.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    pub temperature: f32,
    /// Nominal output-size limit per call
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub budget: BudgetLimits,
    pub max_user_messages: usize,
    pub max_model_messages: usize,
    pub rate_limit_token_factor: f32,
    pub rate_limit_wait_secs: u64,
    pub repo_context_chars: usize,
    pub notes_file: String,
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(config: &AppConfig) -> Self {
        let agent = &config.agent;
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_iterations: agent.max_iterations,
            budget: BudgetLimits::from(agent),
            max_user_messages: agent.max_user_messages,
            max_model_messages: agent.max_model_messages,
            rate_limit_token_factor: agent.rate_limit_token_factor,
            rate_limit_wait_secs: agent.rate_limit_wait_secs,
            repo_context_chars: agent.repo_context_chars,
            notes_file: agent.notes_file.clone(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Mutable state of one run. Dropped when the run ends.
struct RunState {
    budget: BudgetState,
    transcript: Transcript,
    /// Paths in the order they were first written
    written: Vec<String>,
    originals: HashMap<String, String>,
    descriptions: HashMap<String, String>,
}

impl RunState {
    fn new(limits: BudgetLimits) -> Self {
        Self {
            budget: BudgetState::new(limits),
            transcript: Transcript::new(),
            written: Vec::new(),
            originals: HashMap::new(),
            descriptions: HashMap::new(),
        }
    }

    fn record_write(&mut self, path: &str, previous: Option<&String>, description: Option<&str>) {
        if !self.written.iter().any(|p| p == path) {
            self.written.push(path.to_string());
            self.originals
                .insert(path.to_string(), previous.cloned().unwrap_or_default());
        }
        if let Some(desc) = description.map(str::trim).filter(|d| !d.is_empty()) {
            self.descriptions.insert(path.to_string(), desc.to_string());
        }
    }
}

/// Tool-result message carrying a structured error.
fn error_result(call_id: &str, message: &str, kind: &str) -> Message {
    let body = serde_json::json!({ "error": message, "kind": kind });
    Message::tool_error(call_id, body.to_string())
}

/// Drives the model and the tools for one ticket at a time.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
    tools: Vec<ToolDefinition>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, dispatcher: ToolDispatcher, config: OrchestratorConfig) -> Self {
        Self {
            provider,
            dispatcher,
            config,
            tools: ticketforge_tools::catalog(),
        }
    }

    /// Set the maximum number of model round-trips.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Run one ticket to completion.
    ///
    /// `repo_context` is a newline-separated listing of relevant paths; it is
    /// truncated to the configured character budget.
    pub async fn run(&self, ticket: &str, repo_context: &str) -> RunResult {
        let ticket_number = extract_ticket_number(ticket);
        info!(
            provider = self.provider.name(),
            model = %self.config.model,
            ticket_number = ticket_number.as_deref().unwrap_or("-"),
            "Starting run"
        );

        let mut run = RunState::new(self.config.budget);
        match self.drive(ticket, ticket_number.as_deref(), repo_context, &mut run).await {
            Ok(final_text) => {
                info!(
                    files_written = run.written.len(),
                    budget = %run.budget.summary(),
                    "Tool loop finished"
                );
                self.finish(ticket, ticket_number, &final_text, run).await
            }
            Err(e) => {
                error!(error = %e, budget = %run.budget.summary(), "Run failed; producing notes");
                fallback::error_result(&self.dispatcher, &self.config.notes_file, ticket, &e.to_string())
                    .await
            }
        }
    }

    /// The loop itself. Returns the model's last text reply.
    async fn drive(
        &self,
        ticket: &str,
        ticket_number: Option<&str>,
        repo_context: &str,
        run: &mut RunState,
    ) -> Result<String, Error> {
        // PLANNING
        let keywords = extract_keywords(ticket);
        let seed = SeedPrompt {
            ticket,
            ticket_number,
            keywords: &keywords,
            repo_context: &truncate_context(repo_context, self.config.repo_context_chars),
            tools: &self.tools,
            budget_summary: run.budget.summary(),
        }
        .render();
        run.transcript.push(Message::system(seed));
        run.transcript.push(Message::user(KICKOFF));

        let mut last_text = String::new();
        for iteration in 1..=self.config.max_iterations {
            debug!(iteration, messages = run.transcript.len(), "Orchestrator iteration");

            // AWAITING_MODEL
            let response = self.call_model(&mut run.transcript, iteration).await?;
            let tool_calls = response.message.tool_calls.clone();
            if !response.message.content.trim().is_empty() {
                last_text = response.message.content.clone();
            }
            run.transcript.push(response.message);

            if tool_calls.is_empty() {
                info!(iteration, "Model replied without tool calls");
                return Ok(last_text);
            }

            // DISPATCHING_TOOLS
            debug!(iteration, tool_count = tool_calls.len(), "Dispatching tool calls");
            self.dispatch_batch(&tool_calls, run).await;
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "Iteration ceiling reached, finishing run"
        );
        Ok(last_text)
    }

    fn build_request(&self, transcript: &Transcript, max_tokens: u32) -> ProviderRequest {
        ProviderRequest {
            model: self.config.model.clone(),
            messages: prune(
                &transcript.messages,
                self.config.max_user_messages,
                self.config.max_model_messages,
            ),
            temperature: self.config.temperature,
            max_tokens: Some(max_tokens),
            tools: self.tools.clone(),
        }
    }

    fn reduced_max_tokens(&self) -> u32 {
        let scaled = (self.config.max_tokens as f32 * self.config.rate_limit_token_factor) as u32;
        scaled.max(MIN_RETRY_TOKENS).min(self.config.max_tokens)
    }

    /// One model call, with the single degrade-and-retry on a rate limit.
    async fn call_model(
        &self,
        transcript: &mut Transcript,
        iteration: u32,
    ) -> Result<ProviderResponse, Error> {
        let request = self.build_request(transcript, self.config.max_tokens);
        match self.provider.complete(request).await {
            Ok(response) => Ok(response),
            Err(ProviderError::RateLimited { retry_after_secs }) => {
                let reduced = self.reduced_max_tokens();
                warn!(
                    iteration,
                    retry_after_secs,
                    max_tokens = reduced,
                    "Rate limited, retrying once with a smaller output limit"
                );
                transcript.push(Message::user(RATE_LIMIT_DIRECTIVE));

                let wait = retry_after_secs.min(self.config.rate_limit_wait_secs);
                if wait > 0 {
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }

                let retry = self.build_request(transcript, reduced);
                Ok(self.provider.complete(retry).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve every requested tool in order, then add the wrap-up directive
    /// if this batch hit the tool-call ceiling. From the next batch on only
    /// writes are dispatched.
    async fn dispatch_batch(&self, calls: &[MessageToolCall], run: &mut RunState) {
        for tc in calls {
            let call = ToolCall::from_message(tc);
            let result = self.dispatch_one(&call, run).await;
            run.transcript.push(result);
        }

        if run.budget.tool_calls_exhausted() && !run.budget.is_wrapping_up() {
            run.budget.begin_wrap_up();
            info!(budget = %run.budget.summary(), "Tool-call ceiling reached, directing model to write changes");
            run.transcript.push(Message::user(TOOL_BUDGET_DIRECTIVE));
        }
    }

    async fn dispatch_one(&self, call: &ToolCall, run: &mut RunState) -> Message {
        let request = match ToolRequest::parse(&call.name, call.arguments.clone()) {
            Ok(request) => request,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Rejected tool call");
                return error_result(&call.id, &e.to_string(), "invalid_request");
            }
        };

        if let Err(e) = run.budget.try_consume(request.category()) {
            warn!(
                tool = %call.name,
                call_id = %call.id,
                budget = %run.budget.summary(),
                "Budget exhausted, tool not dispatched"
            );
            return error_result(&call.id, &e.to_string(), "budget_exhausted");
        }

        match self.dispatcher.execute(&request).await {
            Ok(output) => {
                if let (
                    ToolRequest::WriteFile(input),
                    ToolOutput::FileWritten {
                        path,
                        previous_content,
                        ..
                    },
                ) = (&request, &output)
                {
                    run.record_write(path, previous_content.as_ref(), input.description.as_deref());
                }
                debug!(tool = %call.name, call_id = %call.id, "Tool succeeded");
                Message::tool_result(&call.id, output.to_json())
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                error_result(&call.id, &e.to_string(), "tool_error")
            }
        }
    }

    /// Build the result from the final reply and the files on disk.
    async fn finish(
        &self,
        ticket: &str,
        ticket_number: Option<String>,
        final_text: &str,
        run: RunState,
    ) -> RunResult {
        let (summary, summary_error) = match parse_summary(final_text) {
            Ok(summary) => (Some(summary), None),
            Err(e) => {
                warn!(error = %e, "Final summary unusable, deriving analysis from the ticket");
                (None, Some(e.to_string()))
            }
        };

        let mut changes = Vec::with_capacity(run.written.len());
        for path in &run.written {
            let new_content = match self.dispatcher.read_snapshot(path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path, error = %e, "Written file could not be re-read");
                    continue;
                }
            };
            let change_description = summary
                .as_ref()
                .and_then(|s| s.changes.get(path))
                .or_else(|| run.descriptions.get(path))
                .cloned()
                .unwrap_or_else(|| format!("Updated {path}"));

            changes.push(CodeChange {
                file_path: path.clone(),
                original_content: run.originals.get(path).cloned().unwrap_or_default(),
                new_content,
                change_description,
            });
        }

        if changes.is_empty() {
            info!("No files written, producing implementation notes");
            let notes_file = &self.config.notes_file;
            let analysis = match &summary {
                Some(s) => build_analysis(s, ticket, ticket_number, std::slice::from_ref(notes_file)),
                None => fallback::fallback_analysis(
                    ticket,
                    ticket_number,
                    notes_file,
                    summary_error.as_deref(),
                ),
            };
            let change = fallback::produce(
                &self.dispatcher,
                notes_file,
                &analysis,
                ticket,
                summary_error.as_deref(),
            )
            .await;
            return RunResult {
                analysis,
                changes: vec![change],
            };
        }

        let written: Vec<String> = changes.iter().map(|c| c.file_path.clone()).collect();
        let analysis = build_analysis(
            summary.as_ref().unwrap_or(&FinalSummary::default()),
            ticket,
            ticket_number,
            &written,
        );
        RunResult { analysis, changes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::{Value, json};
    use ticketforge_core::message::Role;
    use ticketforge_core::ticket::Complexity;

    fn small_config() -> OrchestratorConfig {
        OrchestratorConfig {
            notes_file: "IMPLEMENTATION_NOTES.md".into(),
            ..OrchestratorConfig::default()
        }
    }

    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn hello() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo\n").unwrap();
        dir
    }

    fn orchestrator(
        provider: &Arc<SequentialMockProvider>,
        dir: &tempfile::TempDir,
        config: OrchestratorConfig,
    ) -> Orchestrator {
        Orchestrator::new(
            provider.clone(),
            ToolDispatcher::new(dir.path()).unwrap(),
            config,
        )
    }

    /// Tool-result messages in the transcript sent on call `index`.
    fn tool_results(provider: &SequentialMockProvider, index: usize) -> Vec<(String, Value, bool)> {
        provider.requests()[index]
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| {
                (
                    m.tool_call_id.clone().unwrap(),
                    serde_json::from_str(&m.content).unwrap(),
                    m.is_error(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn no_tool_calls_ends_in_one_iteration_with_notes() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![make_text_response(
            "I cannot do this.",
        )]));
        let result = orchestrator(&provider, &dir, small_config())
            .run("PROJ-5: Add a footer", "src/lib.rs")
            .await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].file_path, "IMPLEMENTATION_NOTES.md");
        assert_eq!(result.analysis.ticket_number.as_deref(), Some("PROJ-5"));
        assert!(dir.path().join("IMPLEMENTATION_NOTES.md").exists());

        // A reply without the JSON summary is quoted as the failure
        assert!(result.analysis.description.contains("Malformed model output"));
        assert!(result.changes[0].new_content.contains("## Error"));
    }

    #[tokio::test]
    async fn summary_without_writes_produces_notes_without_error() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![make_text_response(
            r#"{"title": "Add a footer", "requirements": ["Footer on every page"]}"#,
        )]));
        let result = orchestrator(&provider, &dir, small_config())
            .run("Add a footer", "")
            .await;

        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.analysis.requirements, vec!["Footer on every page"]);
        assert!(!result.analysis.description.contains("Malformed"));
        assert!(result.changes[0].new_content.contains("## Status"));
    }

    #[tokio::test]
    async fn seed_request_carries_ticket_catalog_and_limits() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![make_text_response("done")]));
        orchestrator(&provider, &dir, small_config())
            .run("Add a footer component", "src/lib.rs\nREADME.md")
            .await;

        let request = &provider.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("Add a footer component"));
        assert!(request.messages[0].content.contains("src/lib.rs"));
        assert!(request.messages[0].content.contains("footer"));
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(request.tools.len(), 6);
        assert_eq!(request.max_tokens, Some(4096));
    }

    #[tokio::test]
    async fn write_then_summary_produces_changes() {
        let dir = repo();
        let summary = json!({
            "title": "Add greeting",
            "requirements": ["greet by name"],
            "files_to_modify": ["src/lib.rs", "src/greet.rs"],
            "implementation_plan": ["write greet"],
            "estimated_complexity": "low",
            "changes": {"src/lib.rs": "Export greet"}
        });
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![
                    make_tool_call("c1", "read_file", json!({"path": "src/lib.rs"})),
                    make_tool_call(
                        "c2",
                        "write_file",
                        json!({"path": "src/lib.rs", "content": "pub mod greet;\n"}),
                    ),
                    make_tool_call(
                        "c3",
                        "write_file",
                        json!({"path": "src/greet.rs", "content": "pub fn greet() {}\n", "description": "New greet module"}),
                    ),
                ],
                "Reading then writing",
            ),
            make_text_response(&format!("```json\n{summary}\n```")),
        ]));

        let result = orchestrator(&provider, &dir, small_config())
            .run("Add a greeting", "")
            .await;

        assert_eq!(result.analysis.title, "Add greeting");
        assert_eq!(result.analysis.estimated_complexity, Complexity::Low);
        assert_eq!(result.changes.len(), 2);

        let lib = &result.changes[0];
        assert_eq!(lib.file_path, "src/lib.rs");
        assert_eq!(lib.original_content, "pub fn hello() {}\n");
        assert_eq!(lib.new_content, "pub mod greet;\n");
        assert_eq!(lib.change_description, "Export greet");

        let greet = &result.changes[1];
        assert_eq!(greet.original_content, "");
        assert_eq!(greet.change_description, "New greet module");
    }

    #[tokio::test]
    async fn repeated_writes_keep_first_original_and_final_content() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![
                    make_tool_call("c1", "write_file", json!({"path": "src/lib.rs", "content": "v1"})),
                    make_tool_call("c2", "write_file", json!({"path": "src/lib.rs", "content": "v2"})),
                ],
                "",
            ),
            make_text_response("no json here"),
        ]));

        let result = orchestrator(&provider, &dir, small_config())
            .run("Rewrite lib", "")
            .await;

        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].original_content, "pub fn hello() {}\n");
        assert_eq!(result.changes[0].new_content, "v2");
        assert_eq!(result.changes[0].change_description, "Updated src/lib.rs");
        // Synthesized from the ticket when the summary is not JSON
        assert_eq!(result.analysis.title, "Rewrite lib");
        assert_eq!(result.analysis.files_to_modify, vec!["src/lib.rs"]);
    }

    #[tokio::test]
    async fn read_over_ceiling_is_rejected_without_io() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![
                    make_tool_call("r1", "read_file", json!({"path": "src/lib.rs"})),
                    make_tool_call("r2", "peek_file", json!({"path": "README.md"})),
                    // Does not exist: a dispatched call would report a tool error
                    make_tool_call("r3", "read_files", json!({"paths": ["missing.rs"]})),
                ],
                "",
            ),
            make_text_response("done"),
        ]));
        let config = OrchestratorConfig {
            budget: BudgetLimits {
                max_tool_calls: 25,
                max_reads: 2,
                max_searches: 6,
            },
            ..small_config()
        };

        orchestrator(&provider, &dir, config).run("Inspect", "").await;

        let results = tool_results(&provider, 1);
        assert_eq!(results.len(), 3);
        assert!(!results[0].2);
        assert!(!results[1].2);
        let (id, body, is_error) = &results[2];
        assert_eq!(id, "r3");
        assert!(is_error);
        assert_eq!(body["kind"], "budget_exhausted");
    }

    #[tokio::test]
    async fn tool_call_ceiling_answers_every_call_and_directs_once() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![
                    make_tool_call("a", "list_directory", json!({})),
                    make_tool_call("b", "list_directory", json!({"path": "src"})),
                    make_tool_call("c", "search_files", json!({"pattern": "hello"})),
                ],
                "",
            ),
            make_tool_call_response(vec![make_tool_call("d", "list_directory", json!({}))], ""),
            make_text_response("done"),
        ]));
        let config = OrchestratorConfig {
            budget: BudgetLimits {
                max_tool_calls: 2,
                max_reads: 12,
                max_searches: 6,
            },
            ..small_config()
        };

        orchestrator(&provider, &dir, config).run("Explore", "").await;

        let second = provider.requests()[1].clone();
        let results = tool_results(&provider, 1);
        assert_eq!(
            results.iter().map(|r| r.0.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(results[2].1["kind"], "budget_exhausted");
        assert_eq!(second.messages.last().unwrap().content, TOOL_BUDGET_DIRECTIVE);

        let third = &provider.requests()[2];
        let directives = third
            .messages
            .iter()
            .filter(|m| m.content == TOOL_BUDGET_DIRECTIVE)
            .count();
        assert_eq!(directives, 1);
        let last_tool = third.messages.iter().rev().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(last_tool.tool_call_id.as_deref(), Some("d"));
        assert!(last_tool.is_error());
    }

    #[tokio::test]
    async fn write_after_directive_lands_on_disk() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![
                    make_tool_call("l", "list_directory", json!({})),
                    make_tool_call("r", "read_file", json!({"path": "src/lib.rs"})),
                ],
                "",
            ),
            make_tool_call_response(
                vec![
                    make_tool_call(
                        "w",
                        "write_file",
                        json!({"path": "src/lib.rs", "content": "pub fn hello() -> u8 { 1 }\n"}),
                    ),
                    make_tool_call("x", "read_file", json!({"path": "README.md"})),
                    make_tool_call(
                        "n",
                        "write_file",
                        json!({"path": "src/new.rs", "content": "// new\n"}),
                    ),
                ],
                "",
            ),
            make_text_response(r#"{"title": "Return one"}"#),
        ]));
        let config = OrchestratorConfig {
            budget: BudgetLimits {
                max_tool_calls: 2,
                max_reads: 12,
                max_searches: 6,
            },
            ..small_config()
        };

        let result = orchestrator(&provider, &dir, config).run("Return one", "").await;

        let second = provider.requests()[1].clone();
        assert_eq!(second.messages.last().unwrap().content, TOOL_BUDGET_DIRECTIVE);

        let results = tool_results(&provider, 2);
        let by_id = |id: &str| results.iter().find(|r| r.0 == id).unwrap().clone();
        assert!(!by_id("w").2);
        assert!(!by_id("n").2);
        assert_eq!(by_id("x").1["kind"], "budget_exhausted");

        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
            "pub fn hello() -> u8 { 1 }\n"
        );
        let paths: Vec<&str> = result.changes.iter().map(|c| c.file_path.as_str()).collect();
        assert_eq!(paths, vec!["src/lib.rs", "src/new.rs"]);
        assert_eq!(result.analysis.title, "Return one");
    }

    #[tokio::test]
    async fn invalid_calls_consume_no_budget() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![
                    make_tool_call("x", "shell", json!({"command": "ls"})),
                    make_tool_call("y", "read_file", json!({})),
                    make_tool_call(
                        "b",
                        "read_files",
                        json!({"paths": ["a", "b", "c", "d", "e", "f"]}),
                    ),
                    make_tool_call("s", "search_files", json!({"pattern": ""})),
                    make_tool_call("z", "read_file", json!({"path": "src/lib.rs"})),
                ],
                "",
            ),
            make_text_response("done"),
        ]));
        let config = OrchestratorConfig {
            budget: BudgetLimits {
                max_tool_calls: 1,
                max_reads: 1,
                max_searches: 1,
            },
            ..small_config()
        };

        orchestrator(&provider, &dir, config).run("Inspect", "").await;

        let results = tool_results(&provider, 1);
        assert_eq!(results[0].1["kind"], "invalid_request");
        assert_eq!(results[1].1["kind"], "invalid_request");
        assert_eq!(results[2].1["kind"], "invalid_request");
        assert_eq!(results[3].1["kind"], "invalid_request");
        assert!(!results[4].2, "valid read should still fit the budget");
    }

    #[tokio::test]
    async fn failed_tool_is_reported_and_run_continues() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![make_tool_call("m", "read_file", json!({"path": "../etc/passwd"}))],
                "",
            ),
            make_text_response("done"),
        ]));

        let result = orchestrator(&provider, &dir, small_config()).run("Inspect", "").await;

        assert_eq!(provider.call_count(), 2);
        let results = tool_results(&provider, 1);
        assert_eq!(results[0].1["kind"], "tool_error");
        assert!(results[0].2);
        assert_eq!(result.changes.len(), 1);
    }

    #[tokio::test]
    async fn rate_limit_retries_once_with_reduced_limit() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Err(rate_limited()),
            Ok(make_text_response("done")),
        ]));

        orchestrator(&provider, &dir, small_config()).run("Add thing", "").await;

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].max_tokens, Some(4096));
        assert_eq!(requests[1].max_tokens, Some(2457));
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, RATE_LIMIT_DIRECTIVE);
    }

    #[tokio::test]
    async fn second_rate_limit_falls_back_with_error() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Err(rate_limited()),
            Err(rate_limited()),
        ]));

        let result = orchestrator(&provider, &dir, small_config())
            .run("WEB-2: Add thing", "")
            .await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].file_path, "IMPLEMENTATION_NOTES.md");
        assert!(result.analysis.description.contains("Rate limited"));
        assert!(result.changes[0].new_content.contains("Rate limited"));
    }

    #[tokio::test]
    async fn provider_error_falls_back() {
        let dir = repo();
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));

        let result = orchestrator(&provider, &dir, small_config()).run("Fix it", "").await;
        assert_eq!(result.changes.len(), 1);
        assert!(result.analysis.description.contains("bad key"));
    }

    #[tokio::test]
    async fn iteration_ceiling_forces_termination() {
        let dir = repo();
        let responses = (0..3)
            .map(|i| {
                make_tool_call_response(
                    vec![make_tool_call(&format!("l{i}"), "list_directory", json!({}))],
                    "",
                )
            })
            .collect();
        let provider = Arc::new(SequentialMockProvider::ok(responses));

        let result = orchestrator(&provider, &dir, small_config())
            .with_max_iterations(3)
            .run("Loop forever", "")
            .await;

        assert_eq!(provider.call_count(), 3);
        assert_eq!(result.changes.len(), 1);
    }

    #[tokio::test]
    async fn transcript_is_pruned_before_each_call() {
        let dir = repo();
        let mut responses: Vec<_> = (0..5)
            .map(|i| {
                make_tool_call_response(
                    vec![make_tool_call(&format!("l{i}"), "list_directory", json!({}))],
                    "looking",
                )
            })
            .collect();
        responses.push(make_text_response("done"));
        let provider = Arc::new(SequentialMockProvider::ok(responses));
        let config = OrchestratorConfig {
            max_user_messages: 1,
            max_model_messages: 2,
            ..small_config()
        };

        orchestrator(&provider, &dir, config).run("Explore", "").await;

        for request in provider.requests() {
            let users = request.messages.iter().filter(|m| m.role == Role::User).count();
            let models = request.messages.iter().filter(|m| m.role == Role::Assistant).count();
            assert!(users <= 1);
            assert!(models <= 2);
            assert_eq!(request.messages[0].role, Role::System);
        }
    }

    #[tokio::test]
    async fn unrooted_dispatcher_reports_errors_and_falls_back() {
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(
                vec![make_tool_call("w", "write_file", json!({"path": "a.rs", "content": "x"}))],
                "",
            ),
            make_text_response("done"),
        ]));
        let orchestrator = Orchestrator::new(provider.clone(), ToolDispatcher::unrooted(), small_config());

        let result = orchestrator.run("Write a", "").await;

        let results = tool_results(&provider, 1);
        assert_eq!(results[0].1["kind"], "tool_error");
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].file_path, "IMPLEMENTATION_NOTES.md");
    }

    #[tokio::test]
    async fn budget_never_exceeded_across_a_run() {
        let dir = repo();
        let reads: Vec<_> = (0..8)
            .map(|i| make_tool_call(&format!("r{i}"), "peek_file", json!({"path": "src/lib.rs"})))
            .collect();
        let searches: Vec<_> = (0..8)
            .map(|i| make_tool_call(&format!("s{i}"), "search_files", json!({"pattern": "hello"})))
            .collect();
        let provider = Arc::new(SequentialMockProvider::ok(vec![
            make_tool_call_response(reads, ""),
            make_tool_call_response(searches, ""),
            make_text_response("done"),
        ]));
        let limits = BudgetLimits {
            max_tool_calls: 10,
            max_reads: 5,
            max_searches: 3,
        };
        let config = OrchestratorConfig {
            budget: limits,
            ..small_config()
        };

        orchestrator(&provider, &dir, config).run("Explore", "").await;

        let ok_reads = tool_results(&provider, 1).iter().filter(|r| !r.2).count();
        assert_eq!(ok_reads, 5);
        let second_batch: Vec<_> = tool_results(&provider, 2)
            .into_iter()
            .filter(|r| r.0.starts_with('s'))
            .collect();
        assert_eq!(second_batch.iter().filter(|r| !r.2).count(), 3);
        assert!(second_batch.iter().filter(|r| r.2).all(|r| r.1["kind"] == "budget_exhausted"));
    }
}
