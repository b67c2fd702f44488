use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::page::{index_selector, AgentPage};
use crate::secret::SensitiveData;

/// Longest pause the model may request in a single `wait` action.
const MAX_WAIT_MS: u64 = 10_000;

/// Actions the agent can take on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    Navigate { url: String },
    /// Click the element with this index in the current snapshot.
    Click { index: usize },
    /// Click at page coordinates (cross-origin frames such as reCAPTCHA).
    ClickAt { x: f64, y: f64 },
    /// Type into the element with this index. May contain secret placeholders.
    Type { index: usize, text: String },
    PressKey { key: String },
    Scroll { pixels: i64 },
    Wait { duration_ms: u64 },
    GoBack,
    /// Finish the run with a report.
    Done { success: bool, message: String },
}

impl std::fmt::Display for AgentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentAction::Navigate { url } => write!(f, "navigate {url}"),
            AgentAction::Click { index } => write!(f, "click [{index}]"),
            AgentAction::ClickAt { x, y } => write!(f, "click at ({x:.0},{y:.0})"),
            AgentAction::Type { index, text } => write!(f, "type {text:?} into [{index}]"),
            AgentAction::PressKey { key } => write!(f, "press {key}"),
            AgentAction::Scroll { pixels } => write!(f, "scroll {pixels}px"),
            AgentAction::Wait { duration_ms } => write!(f, "wait {duration_ms}ms"),
            AgentAction::GoBack => f.write_str("go back"),
            AgentAction::Done { success, message } => {
                write!(f, "done (success={success}): {message}")
            }
        }
    }
}

impl AgentAction {
    /// Copy with any secret values in free text replaced by placeholders.
    pub fn redacted(&self, secrets: &SensitiveData) -> Self {
        match self {
            AgentAction::Navigate { url } => AgentAction::Navigate {
                url: secrets.redact(url),
            },
            AgentAction::Type { index, text } => AgentAction::Type {
                index: *index,
                text: secrets.redact(text),
            },
            AgentAction::PressKey { key } => AgentAction::PressKey {
                key: secrets.redact(key),
            },
            AgentAction::Done { success, message } => AgentAction::Done {
                success: *success,
                message: secrets.redact(message),
            },
            other => other.clone(),
        }
    }
}

/// One model reply: what to do next and why.
#[derive(Debug, Clone, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub reasoning: String,
    pub action: AgentAction,
}

impl Decision {
    /// Extract the JSON object from a model reply, tolerating surrounding prose
    /// or code fences.
    pub fn parse(content: &str) -> Result<Self> {
        let start = content.find('{');
        let end = content.rfind('}');
        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str(&content[start..=end])
                    .map_err(|e| Error::Agent(format!("Unreadable decision: {e}")))
            }
            _ => Err(Error::Agent("Reply contained no JSON decision".into())),
        }
    }
}

/// Result of executing one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Execute an action on the page. Page-level failures are reported in the
/// result, never as `Err`, so the model can react to them on the next step.
pub async fn execute_action<P: AgentPage + ?Sized>(
    page: &P,
    action: &AgentAction,
    secrets: &SensitiveData,
) -> ActionResult {
    let outcome = match action {
        AgentAction::Navigate { url } => page.goto(url).await.map(|_| format!("Navigated to {url}")),
        AgentAction::Click { index } => page
            .click(&index_selector(*index))
            .await
            .map(|_| format!("Clicked [{index}]")),
        AgentAction::ClickAt { x, y } => page
            .click_at(*x, *y)
            .await
            .map(|_| format!("Clicked at ({x:.0},{y:.0})")),
        AgentAction::Type { index, text } => type_into(page, *index, text, secrets)
            .await
            .map(|_| format!("Typed {text:?} into [{index}]")),
        AgentAction::PressKey { key } => page.press_key(key).await.map(|_| format!("Pressed {key}")),
        AgentAction::Scroll { pixels } => page
            .scroll_by(*pixels)
            .await
            .map(|_| format!("Scrolled {pixels}px")),
        AgentAction::Wait { duration_ms } => {
            let ms = (*duration_ms).min(MAX_WAIT_MS);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(format!("Waited {ms}ms"))
        }
        AgentAction::GoBack => page.go_back().await.map(|_| "Navigated back".to_string()),
        AgentAction::Done { message, .. } => Ok(format!("Finished: {message}")),
    };

    match outcome {
        Ok(message) => ActionResult::success(secrets.redact(&message)),
        // Errors may echo typed text back; keep secrets out of the history.
        Err(e) => ActionResult::failure(secrets.redact(&format!("{action} failed: {e}"))),
    }
}

/// Type `text`, resolving secret placeholders. Secrets only go into password
/// fields, which keeps them out of the screenshots sent to the model.
async fn type_into<P: AgentPage + ?Sized>(
    page: &P,
    index: usize,
    text: &str,
    secrets: &SensitiveData,
) -> Result<()> {
    let selector = index_selector(index);
    if secrets.has_placeholder(text) {
        let kind = page.input_type(&selector).await?;
        if kind != "password" {
            return Err(Error::Agent(format!(
                "secrets can only be typed into password fields, [{index}] has type {kind:?}"
            )));
        }
    }
    let resolved = secrets.resolve(text);
    page.type_text(&selector, &resolved).await
}
