use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ai_login::agent::{AgentFactory, BrowsingAgent};
use ai_login::classify::STILL_ON_LOGIN_PAGE;
use ai_login::driver::{perform_login, DriverOptions, LoginRequest, API_KEY_MISSING, CREDENTIALS_MISSING};
use ai_login::extract::CookieAttributes;
use ai_login::llm::LlmConfig;
use ai_login::report::report;
use ai_login::{AgentHistory, BrowserConfig, Error, LoginResult, RawCookie, Result, SameSite, SecretString, SensitiveData};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

/// Where the scripted agent should fail, if anywhere.
#[derive(Clone, Copy, PartialEq)]
enum FailAt {
    Nowhere,
    Configure,
    Run,
}

#[derive(Clone)]
struct Script {
    fail_at: FailAt,
    history: String,
    final_url: Option<String>,
    cookies: Option<Vec<RawCookie>>,
    screenshot: Option<Vec<u8>>,
    stop_fails: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_at: FailAt::Nowhere,
            history: String::new(),
            final_url: Some("https://portal.example/mypage".into()),
            cookies: Some(Vec::new()),
            screenshot: None,
            stop_fails: false,
        }
    }
}

#[derive(Default)]
struct Calls {
    created: AtomicUsize,
    configured: AtomicUsize,
    stopped: AtomicUsize,
    task: Mutex<Option<String>>,
    max_steps: Mutex<Option<usize>>,
    browser: Mutex<Option<BrowserConfig>>,
    secrets: Mutex<Option<SensitiveData>>,
    model: Mutex<Option<String>>,
}

struct ScriptedAgent {
    script: Script,
    calls: Arc<Calls>,
}

#[async_trait]
impl BrowsingAgent for ScriptedAgent {
    async fn configure(&mut self, config: BrowserConfig) -> Result<()> {
        self.calls.configured.fetch_add(1, Ordering::SeqCst);
        *self.calls.browser.lock().unwrap() = Some(config);
        if self.script.fail_at == FailAt::Configure {
            return Err(Error::LaunchError("chrome not found".into()));
        }
        Ok(())
    }

    async fn run(&mut self, task: &str, max_steps: usize) -> Result<AgentHistory> {
        *self.calls.task.lock().unwrap() = Some(task.to_string());
        *self.calls.max_steps.lock().unwrap() = Some(max_steps);
        if self.script.fail_at == FailAt::Run {
            return Err(Error::Llm("Anthropic API error (401): invalid x-api-key".into()));
        }
        Ok(AgentHistory {
            steps: Vec::new(),
            final_report: Some(self.script.history.clone()),
        })
    }

    async fn cookies(&self) -> Result<Vec<RawCookie>> {
        self.script
            .cookies
            .clone()
            .ok_or_else(|| Error::Agent("no context".into()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.script
            .screenshot
            .clone()
            .ok_or_else(|| Error::ScreenshotError("page crashed".into()))
    }

    async fn current_url(&self) -> Result<String> {
        self.script
            .final_url
            .clone()
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    async fn stop(&mut self) -> Result<()> {
        self.calls.stopped.fetch_add(1, Ordering::SeqCst);
        if self.script.stop_fails {
            return Err(Error::Agent("already gone".into()));
        }
        Ok(())
    }
}

struct ScriptedFactory {
    script: Script,
    calls: Arc<Calls>,
}

impl ScriptedFactory {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(Calls::default()),
        }
    }

    fn created(&self) -> usize {
        self.calls.created.load(Ordering::SeqCst)
    }

    fn stopped(&self) -> usize {
        self.calls.stopped.load(Ordering::SeqCst)
    }
}

impl AgentFactory for ScriptedFactory {
    fn create(&self, llm: LlmConfig, secrets: SensitiveData) -> Result<Box<dyn BrowsingAgent>> {
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        *self.calls.secrets.lock().unwrap() = Some(secrets);
        *self.calls.model.lock().unwrap() = Some(llm.model);
        Ok(Box::new(ScriptedAgent {
            script: self.script.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

fn request(vendor: &str, username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        vendor: vendor.into(),
        login_url: "https://portal.example/logins".into(),
        username: username.into(),
        password: SecretString::new(password),
        headless: true,
    }
}

fn api_key() -> SecretString {
    SecretString::new("sk-test")
}

async fn login(factory: &ScriptedFactory, req: &LoginRequest) -> LoginResult {
    let key = api_key();
    perform_login(req, Some(&key), factory, &DriverOptions::default()).await
}

fn assert_exclusive(result: &LoginResult) {
    assert_ne!(result.cookies().is_some(), result.error().is_some());
    assert_eq!(result.is_success(), result.cookies().is_some());
}

#[tokio::test]
async fn missing_username_or_password_never_builds_agent() {
    for (user, pass) in [("", "pw"), ("alice", ""), ("", "")] {
        let factory = ScriptedFactory::new(Script::default());
        let result = login(&factory, &request("ibj", user, pass)).await;
        assert_eq!(result.error(), Some(CREDENTIALS_MISSING));
        assert_eq!(result.exit_code(), 1);
        assert_eq!(factory.created(), 0);
        assert_exclusive(&result);
    }
}

#[tokio::test]
async fn missing_api_key_never_builds_agent() {
    let factory = ScriptedFactory::new(Script::default());
    let req = request("ibj", "alice", "pw");

    let result = perform_login(&req, None, &factory, &DriverOptions::default()).await;
    assert_eq!(result.error(), Some(API_KEY_MISSING));

    let empty = SecretString::new("");
    let result = perform_login(&req, Some(&empty), &factory, &DriverOptions::default()).await;
    assert_eq!(result.error(), Some(API_KEY_MISSING));
    assert_eq!(result.exit_code(), 1);
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn credentials_checked_before_api_key() {
    let factory = ScriptedFactory::new(Script::default());
    let result = perform_login(&request("ibj", "", ""), None, &factory, &DriverOptions::default()).await;
    assert_eq!(result.error(), Some(CREDENTIALS_MISSING));
}

#[tokio::test]
async fn unsupported_vendor_reported() {
    let factory = ScriptedFactory::new(Script::default());
    let result = login(&factory, &request("acme", "alice", "pw")).await;
    assert_eq!(result.to_json_line(), r#"{"success":false,"error":"Unsupported vendor: acme"}"#);
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn success_off_login_page_returns_normalized_cookies() {
    let mut record = serde_json::Map::new();
    record.insert("name".into(), json!("sid"));
    record.insert("value".into(), json!("abc"));
    record.insert("domain".into(), json!("portal.example"));

    let factory = ScriptedFactory::new(Script {
        cookies: Some(vec![
            RawCookie::Record(record),
            RawCookie::Attributes(CookieAttributes {
                name: Some("csrf".into()),
                value: Some("x".into()),
                domain: Some("portal.example".into()),
                path: Some("/app".into()),
                expires: Some(1767225600.0),
                http_only: Some(true),
                secure: Some(true),
                same_site: Some("Strict".into()),
            }),
        ]),
        screenshot: Some(vec![0x89, b'P', b'N', b'G']),
        ..Script::default()
    });

    let result = login(&factory, &request("ibj", "alice", "pw")).await;
    assert!(result.is_success());
    assert_exclusive(&result);

    let cookies = result.cookies().unwrap();
    assert_eq!(cookies.len(), 2);
    assert_eq!((cookies[0].path.as_str(), cookies[0].expires), ("/", -1));
    assert_eq!(cookies[0].same_site, SameSite::Lax);
    assert_eq!(cookies[1].same_site, SameSite::Strict);
    assert_eq!(cookies[1].expires, 1767225600);
    assert_eq!(result.screenshots, vec!["iVBORw==".to_string()]);

    let value: serde_json::Value = serde_json::from_str(&result.to_json_line()).unwrap();
    for cookie in value["cookies"].as_array().unwrap() {
        for key in ["name", "value", "domain", "path", "expires", "httpOnly", "secure", "sameSite"] {
            assert!(cookie.get(key).is_some(), "missing {key}");
        }
    }
    assert_eq!(factory.stopped(), 1);
}

#[tokio::test]
async fn still_on_login_page_without_markers_fails() {
    let factory = ScriptedFactory::new(Script {
        final_url: Some("https://portal.example/logins".into()),
        history: "clicked the button, an error banner appeared".into(),
        ..Script::default()
    });
    let result = login(&factory, &request("ibj", "alice", "pw")).await;
    assert_eq!(result.error(), Some(STILL_ON_LOGIN_PAGE));
    assert_exclusive(&result);
    assert_eq!(factory.stopped(), 1);
}

#[tokio::test]
async fn unreadable_url_with_otp_marker_succeeds() {
    let factory = ScriptedFactory::new(Script {
        final_url: None,
        cookies: None,
        history: "reached the OTP entry page".into(),
        ..Script::default()
    });
    let result = login(&factory, &request("ibj", "alice", "pw")).await;
    assert!(result.is_success());
    assert_eq!(result.cookies(), Some(&[][..]));
    assert!(result.screenshots.is_empty());
}

#[tokio::test]
async fn failure_in_configure_stops_once() {
    let factory = ScriptedFactory::new(Script {
        fail_at: FailAt::Configure,
        ..Script::default()
    });
    let result = login(&factory, &request("ibj", "alice", "pw")).await;
    assert_eq!(result.error(), Some("Browser launch failed: chrome not found"));
    assert_eq!(factory.stopped(), 1);
    assert_exclusive(&result);
}

#[tokio::test]
async fn failure_in_run_stops_once_and_keeps_screenshot() {
    let factory = ScriptedFactory::new(Script {
        fail_at: FailAt::Run,
        screenshot: Some(b"png".to_vec()),
        stop_fails: true,
        ..Script::default()
    });
    let result = login(&factory, &request("ibj", "alice", "pw")).await;
    assert_eq!(
        result.error(),
        Some("LLM request failed: Anthropic API error (401): invalid x-api-key")
    );
    assert_eq!(result.screenshots, vec!["cG5n".to_string()]);
    assert_eq!(factory.stopped(), 1);
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test]
async fn agent_receives_budget_flags_and_no_plaintext_password() {
    let factory = ScriptedFactory::new(Script::default());
    let mut req = request("ibj", "alice", "correct horse");
    req.headless = false;
    login(&factory, &req).await;

    let task = factory.calls.task.lock().unwrap().clone().unwrap();
    assert!(task.contains("alice"));
    assert!(task.contains("https://portal.example/logins"));
    assert!(!task.contains("correct horse"));
    assert!(task.contains("<secret>password</secret>"));

    assert_eq!(*factory.calls.max_steps.lock().unwrap(), Some(30));
    assert_eq!(factory.calls.configured.load(Ordering::SeqCst), 1);
    assert_eq!(
        factory.calls.model.lock().unwrap().as_deref(),
        Some("claude-sonnet-4-20250514")
    );

    let browser = factory.calls.browser.lock().unwrap().clone().unwrap();
    assert!(!browser.headless);
    assert!(browser
        .extra_args
        .iter()
        .any(|a| a == "disable-blink-features=AutomationControlled"));

    let secrets = factory.calls.secrets.lock().unwrap().clone().unwrap();
    assert_eq!(
        secrets.resolve("<secret>password</secret>").as_str(),
        "correct horse"
    );
}

#[tokio::test]
async fn reporting_is_idempotent() {
    let factory = ScriptedFactory::new(Script::default());
    let result = login(&factory, &request("ibj", "alice", "pw")).await;

    let mut first = Vec::new();
    let mut second = Vec::new();
    report(&result, &mut first).unwrap();
    report(&result, &mut second).unwrap();
    assert_eq!(first, second);
}
