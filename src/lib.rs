pub mod action;
pub mod agent;
pub mod browser;
pub mod classify;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod history;
pub mod llm;
pub mod page;
pub mod prompt;
pub mod report;
pub mod secret;
pub mod stealth;

pub use agent::{AgentFactory, BrowsingAgent, LlmAgentFactory, LlmBrowserAgent};
pub use browser::ChromeSession;
pub use config::{BrowserBuilder, BrowserConfig};
pub use driver::{perform_login, DriverOptions, LoginRequest};
pub use error::{Error, Result};
pub use extract::{CookieRecord, RawCookie, SameSite};
pub use history::AgentHistory;
pub use report::{LoginOutcome, LoginResult};
pub use secret::{SecretString, SensitiveData};
