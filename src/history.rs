use std::fmt;

use crate::action::AgentAction;

/// One observe → decide → act cycle of the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    pub step: usize,
    pub url: String,
    pub reasoning: String,
    pub action: Option<AgentAction>,
    pub outcome: String,
    pub success: bool,
}

/// Trace of an agent run. Its `Display` form is what outcome classification
/// searches, so it holds placeholders instead of secret values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentHistory {
    pub steps: Vec<AgentStep>,
    /// Report given by the model when it declared the task finished.
    pub final_report: Option<String>,
}

impl AgentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.final_report.is_some()
    }
}

impl fmt::Display for AgentHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "step {} @ {}", step.step, step.url)?;
            if !step.reasoning.is_empty() {
                write!(f, " | {}", step.reasoning)?;
            }
            if let Some(action) = &step.action {
                write!(f, " | {action}")?;
            }
            writeln!(f, " | {}", step.outcome)?;
        }
        if let Some(report) = &self.final_report {
            writeln!(f, "final: {report}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: usize, url: &str, reasoning: &str) -> AgentStep {
        AgentStep {
            step: n,
            url: url.into(),
            reasoning: reasoning.into(),
            action: Some(AgentAction::Wait { duration_ms: 500 }),
            outcome: "Waited 500ms".into(),
            success: true,
        }
    }

    #[test]
    fn display_includes_reasoning_and_report() {
        let mut history = AgentHistory::new();
        history.push(step(1, "https://portal/logins", "form is loading"));
        history.final_report = Some("OTP入力画面に到達".into());
        let text = history.to_string();
        assert!(text.contains("step 1 @ https://portal/logins | form is loading | wait 500ms"));
        assert!(text.contains("final: OTP入力画面に到達"));
        assert!(history.is_done());
        assert_eq!(history.len(), 1);
    }
}
