//! The browsing-agent seam and its LLM-driven implementation.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;

use crate::action::{execute_action, AgentAction, Decision};
use crate::browser::ChromeSession;
use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::extract::RawCookie;
use crate::history::{AgentHistory, AgentStep};
use crate::llm::{AnthropicClient, ChatMessage, ChatModel, LlmConfig};
use crate::page::{AgentPage, Page, PageSnapshot};
use crate::secret::SensitiveData;

/// Consecutive failed steps after which the run ends early.
const MAX_FAILURES: usize = 3;

/// Conversation turns kept in the prompt; older ones are dropped. Odd, so the
/// trimmed history still alternates user / assistant after the first message.
const MAX_MESSAGES: usize = 13;

/// A delegate that autonomously works a live browser toward a task.
#[async_trait]
pub trait BrowsingAgent: Send {
    /// Launch the browser this agent will drive.
    async fn configure(&mut self, config: BrowserConfig) -> Result<()>;

    /// Work on `task` for at most `max_steps` actions.
    async fn run(&mut self, task: &str, max_steps: usize) -> Result<AgentHistory>;

    async fn cookies(&self) -> Result<Vec<RawCookie>>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn current_url(&self) -> Result<String>;

    /// Release the browser. Must tolerate being called before `configure`.
    async fn stop(&mut self) -> Result<()>;
}

/// Builds the delegate once preconditions have passed.
pub trait AgentFactory {
    fn create(&self, llm: LlmConfig, secrets: SensitiveData) -> Result<Box<dyn BrowsingAgent>>;
}

/// Factory for [`LlmBrowserAgent`] backed by the Anthropic API and Chrome.
#[derive(Debug, Default, Clone, Copy)]
pub struct LlmAgentFactory;

impl AgentFactory for LlmAgentFactory {
    fn create(&self, llm: LlmConfig, secrets: SensitiveData) -> Result<Box<dyn BrowsingAgent>> {
        let model = AnthropicClient::new(llm)?;
        Ok(Box::new(LlmBrowserAgent::new(Arc::new(model), secrets)))
    }
}

/// Observe → decide → act loop: each step snapshots the page, asks the model
/// for one action, and executes it.
pub struct LlmBrowserAgent {
    model: Arc<dyn ChatModel>,
    secrets: SensitiveData,
    session: Option<ChromeSession>,
    page: Option<Page>,
}

impl LlmBrowserAgent {
    pub fn new(model: Arc<dyn ChatModel>, secrets: SensitiveData) -> Self {
        Self {
            model,
            secrets,
            session: None,
            page: None,
        }
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| Error::Agent("browser is not running".into()))
    }
}

#[async_trait]
impl BrowsingAgent for LlmBrowserAgent {
    async fn configure(&mut self, config: BrowserConfig) -> Result<()> {
        let session = ChromeSession::launch(config).await?;
        let page = session.new_page("about:blank").await;
        // Keep the session before checking the page so stop() can close it.
        self.session = Some(session);
        self.page = Some(page?);
        Ok(())
    }

    async fn run(&mut self, task: &str, max_steps: usize) -> Result<AgentHistory> {
        let page = self.page()?;
        tracing::info!(model = self.model.model(), max_steps, "agent run started");
        run_steps(self.model.as_ref(), page, &self.secrets, task, max_steps).await
    }

    async fn cookies(&self) -> Result<Vec<RawCookie>> {
        let cookies = self.page()?.cookies().await?;
        Ok(cookies.into_iter().map(RawCookie::from).collect())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.page()?.screenshot().await
    }

    async fn current_url(&self) -> Result<String> {
        self.page()?.url().await
    }

    async fn stop(&mut self) -> Result<()> {
        self.page = None;
        match self.session.take() {
            Some(mut session) => session.close().await,
            None => Ok(()),
        }
    }
}

/// Drive `page` toward `task`. Ends on `done`, after `max_steps` model calls,
/// or after [`MAX_FAILURES`] failed steps in a row. Model errors abort the run.
async fn run_steps(
    model: &dyn ChatModel,
    page: &dyn AgentPage,
    secrets: &SensitiveData,
    task: &str,
    max_steps: usize,
) -> Result<AgentHistory> {
    let system = build_system_prompt(task, secrets);
    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut history = AgentHistory::new();
    let mut feedback = String::from("Begin the task.");
    let mut failures = 0;

    for step in 1..=max_steps {
        let snapshot = match page.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(step, error = %e, "page snapshot failed");
                PageSnapshot {
                    url: page.url().await.unwrap_or_default(),
                    ..PageSnapshot::default()
                }
            }
        };

        let mut message = ChatMessage::user(format!(
            "Step {step} of {max_steps}.\nLast result: {feedback}\n\n{}",
            snapshot.describe()
        ));
        if let Ok(png) = page.screenshot().await {
            message = message.with_image(base64::engine::general_purpose::STANDARD.encode(png));
        }
        messages.push(message);
        trim_messages(&mut messages);

        let reply = model.complete(&system, &messages).await?;
        messages.push(ChatMessage::assistant(secrets.redact(&reply)));

        let decision = match Decision::parse(&reply) {
            Ok(decision) => decision,
            Err(e) => {
                failures += 1;
                feedback = format!("{e}. Reply with a single JSON object.");
                history.push(AgentStep {
                    step,
                    url: snapshot.url,
                    reasoning: secrets.redact(&reply),
                    action: None,
                    outcome: e.to_string(),
                    success: false,
                });
                if failures >= MAX_FAILURES {
                    tracing::warn!(step, "stopping after {failures} consecutive failures");
                    break;
                }
                continue;
            }
        };

        let result = execute_action(page, &decision.action, secrets).await;
        let action = decision.action.redacted(secrets);
        tracing::debug!(step, %action, ok = result.success, "agent step");
        if result.success {
            failures = 0;
        } else {
            failures += 1;
            tracing::warn!(step, "{}", result.message);
        }
        feedback = result.message.clone();

        let done = match &action {
            AgentAction::Done { message, .. } => Some(message.clone()),
            _ => None,
        };
        history.push(AgentStep {
            step,
            url: snapshot.url,
            reasoning: secrets.redact(&decision.reasoning),
            action: Some(action),
            outcome: result.message,
            success: result.success,
        });

        if let Some(report) = done {
            history.final_report = Some(report);
            break;
        }
        if failures >= MAX_FAILURES {
            tracing::warn!(step, "stopping after {failures} consecutive failures");
            break;
        }
    }

    tracing::info!(steps = history.len(), done = history.is_done(), "agent run finished");
    Ok(history)
}

/// Keep the first message (it sets up the task) and the most recent turns.
/// Images are only kept on the newest message.
fn trim_messages(messages: &mut Vec<ChatMessage>) {
    if messages.len() > MAX_MESSAGES {
        let excess = messages.len() - MAX_MESSAGES;
        messages.drain(1..=excess);
    }
    let last = messages.len().saturating_sub(1);
    for message in &mut messages[..last] {
        message.image = None;
    }
}

fn build_system_prompt(task: &str, secrets: &SensitiveData) -> String {
    let mut prompt = String::from(
        r#"You are a browser automation agent operating a real Chrome window.
Each turn you receive the page URL, title, a numbered list of interactive
elements with their centre coordinates, the visible text, and a screenshot.
Reply with exactly one JSON object and nothing else:

{"reasoning": "<short explanation>", "action": <action>}

Actions:
- {"type": "navigate", "url": "https://..."}
- {"type": "click", "index": 3}
- {"type": "click_at", "x": 120, "y": 340}   (use for iframes such as reCAPTCHA)
- {"type": "type", "index": 4, "text": "..."}
- {"type": "press_key", "key": "Enter"}
- {"type": "scroll", "pixels": 400}            (negative scrolls up)
- {"type": "wait", "duration_ms": 1500}
- {"type": "go_back"}
- {"type": "done", "success": true, "message": "<what happened>"}

Take one action per turn and check the result on the next turn before moving on.
"#,
    );

    let names = secrets.names();
    if !names.is_empty() {
        prompt.push_str("\nSecret values are never shown to you. To type one into a password field, put its placeholder in the text of a type action:\n");
        for name in names {
            prompt.push_str(&format!("- {name}: {}\n", SensitiveData::placeholder(name)));
        }
    }

    prompt.push_str("\nTask:\n");
    prompt.push_str(task);
    prompt
}
