//! One login run: preconditions, agent run, extraction, classification.

use base64::Engine;

use crate::agent::{AgentFactory, BrowsingAgent};
use crate::classify::{classify, ClassifierRules, Outcome};
use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::extract::{best_effort, extract_session};
use crate::llm::{LlmConfig, DEFAULT_MODEL};
use crate::prompt::{Vendor, PASSWORD_SECRET};
use crate::report::LoginResult;
use crate::secret::{SecretString, SensitiveData};

pub const CREDENTIALS_MISSING: &str =
    "Credentials not provided (IBJ_USERNAME or IBJ_PASSWORD missing)";
pub const API_KEY_MISSING: &str = "ANTHROPIC_API_KEY not set in environment";

/// Maximum number of agent actions per run.
pub const DEFAULT_MAX_STEPS: usize = 30;

/// What to log in to and with which credentials.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub vendor: String,
    pub login_url: String,
    pub username: String,
    pub password: SecretString,
    pub headless: bool,
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub max_steps: usize,
    pub model: String,
    pub chrome_path: Option<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            model: DEFAULT_MODEL.to_string(),
            chrome_path: None,
        }
    }
}

/// Run one login and fold every outcome, including errors, into a result.
///
/// Precondition failures return before the factory is called. Once an agent
/// exists, `stop` is called on it exactly once whatever happens.
pub async fn perform_login(
    request: &LoginRequest,
    api_key: Option<&SecretString>,
    factory: &dyn AgentFactory,
    options: &DriverOptions,
) -> LoginResult {
    let (api_key, vendor) = match check_preconditions(request, api_key) {
        Ok(checked) => checked,
        Err(e) => return LoginResult::failure(e.to_string()),
    };

    tracing::info!(%vendor, headless = request.headless, "starting login");

    let task = vendor.login_task(&request.username, &request.login_url);
    let llm = LlmConfig::new(api_key).model(options.model.as_str());
    let secrets = SensitiveData::new().with(PASSWORD_SECRET, request.password.clone());

    let mut agent = match factory.create(llm, secrets) {
        Ok(agent) => agent,
        Err(e) => return LoginResult::failure(e.to_string()),
    };

    let mut browser = BrowserConfig::for_login(request.headless);
    browser.chrome_path = options.chrome_path.clone();

    let rules = vendor.classifier_rules();
    let result = match drive(agent.as_mut(), browser, &task, options.max_steps, &rules).await {
        Ok(result) => result,
        Err(e) => {
            tracing::info!(error = %e, "login run failed");
            let screenshot = best_effort("screenshot", agent.screenshot(), Vec::new()).await;
            let screenshots = if screenshot.is_empty() {
                Vec::new()
            } else {
                vec![base64::engine::general_purpose::STANDARD.encode(screenshot)]
            };
            LoginResult::failure(e.to_string()).with_screenshots(screenshots)
        }
    };

    if let Err(e) = agent.stop().await {
        tracing::debug!(error = %e, "browser stop failed");
    }

    tracing::info!(success = result.is_success(), "login finished");
    result
}

/// Credentials, then API key, then vendor.
fn check_preconditions(
    request: &LoginRequest,
    api_key: Option<&SecretString>,
) -> Result<(SecretString, Vendor)> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(Error::Configuration(CREDENTIALS_MISSING.into()));
    }
    let api_key = match api_key {
        Some(key) if !key.is_empty() => key.clone(),
        _ => return Err(Error::Configuration(API_KEY_MISSING.into())),
    };
    Ok((api_key, request.vendor.parse()?))
}

async fn drive(
    agent: &mut dyn BrowsingAgent,
    browser: BrowserConfig,
    task: &str,
    max_steps: usize,
    rules: &ClassifierRules,
) -> Result<LoginResult> {
    agent.configure(browser).await?;
    let history = agent.run(task, max_steps).await?;

    let session = extract_session(&*agent).await;
    let screenshots: Vec<String> = session.screenshot.into_iter().collect();

    let outcome = classify(&session.final_url, &history.to_string(), rules);
    tracing::debug!(final_url = %session.final_url, ?outcome, "classified run");

    Ok(match outcome {
        Outcome::Success => LoginResult::success(session.cookies),
        Outcome::Failure(error) => LoginResult::failure(error),
    }
    .with_screenshots(screenshots))
}
