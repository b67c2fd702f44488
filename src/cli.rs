use clap::Parser;

use crate::driver::{DriverOptions, LoginRequest, DEFAULT_MAX_STEPS};
use crate::llm::DEFAULT_MODEL;
use crate::secret::SecretString;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const USERNAME_ENV: &str = "IBJ_USERNAME";
pub const PASSWORD_ENV: &str = "IBJ_PASSWORD";

/// AI login automation: log in to a vendor portal with an LLM-driven browser
/// agent and print the session cookies as JSON.
#[derive(Debug, Parser)]
#[command(name = "ai-login", version)]
pub struct Cli {
    /// Vendor key (e.g. ibj)
    #[arg(long)]
    pub vendor: String,

    /// Login page URL
    #[arg(long)]
    pub login_url: String,

    /// Run the browser headless (the default)
    #[arg(long)]
    pub headless: bool,

    /// Show the browser window, for debugging
    #[arg(long)]
    pub no_headless: bool,

    /// Maximum number of agent actions
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,

    /// Model used by the agent
    #[arg(long, env = "AI_LOGIN_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Chrome or Chromium executable; auto-detected when unset
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<String>,
}

/// Values read from the environment rather than the command line.
#[derive(Debug, Default)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    pub api_key: Option<SecretString>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            username: lookup(USERNAME_ENV).unwrap_or_default(),
            password: SecretString::new(lookup(PASSWORD_ENV).unwrap_or_default()),
            api_key: lookup(API_KEY_ENV)
                .filter(|key| !key.is_empty())
                .map(SecretString::new),
        }
    }
}

impl Cli {
    /// `--no-headless` wins over `--headless`.
    pub fn is_headless(&self) -> bool {
        !self.no_headless
    }

    pub fn login_request(&self, credentials: &Credentials) -> LoginRequest {
        LoginRequest {
            vendor: self.vendor.clone(),
            login_url: self.login_url.clone(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            headless: self.is_headless(),
        }
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            max_steps: self.max_steps,
            model: self.model.clone(),
            chrome_path: self.chrome_path.clone(),
        }
    }
}

/// One-line message for a rendered clap error. A headline ending in `:` is
/// followed by the indented items it introduces (e.g. the missing arguments).
pub fn usage_error_message(rendered: &str) -> String {
    let mut lines = rendered.lines();
    let headline = lines.next().unwrap_or_default().trim();
    let mut message = headline.trim_start_matches("error: ").to_string();
    if message.ends_with(':') {
        let items: Vec<&str> = lines
            .take_while(|line| !line.trim().is_empty())
            .map(str::trim)
            .collect();
        if !items.is_empty() {
            message.push(' ');
            message.push_str(&items.join(", "));
        }
    }
    message
}
