use std::time::Duration;

use crate::browser::ChromeSession;
use crate::error::Result;

/// Launch flags passed to Chrome for every login run.
/// chromiumoxide adds the `--` prefix itself, so keys are written without it.
pub const LOGIN_LAUNCH_FLAGS: &[&str] = &[
    "disable-blink-features=AutomationControlled",
    "no-sandbox",
    "disable-setuid-sandbox",
];

#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub headless: bool,
    pub stealth: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Extra Chrome flags, without the leading `--`.
    pub extra_args: Vec<String>,
    /// Default timeout for element waits (default: 30s).
    pub default_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            stealth: true,
            viewport_width: 1280,
            viewport_height: 1100,
            chrome_path: None,
            extra_args: Vec::new(),
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserConfig {
    /// Config used by the login driver: the requested headless mode plus the
    /// anti-detection launch flags.
    pub fn for_login(headless: bool) -> Self {
        BrowserBuilder::new()
            .headless(headless)
            .args(LOGIN_LAUNCH_FLAGS.iter().copied())
            .build_config()
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn stealth(mut self, stealth: bool) -> Self {
        self.config.stealth = stealth;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Append a Chrome flag, e.g. `"no-sandbox"` or `"lang=ja-JP"`.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the default timeout for element waits.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<ChromeSession> {
        ChromeSession::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
