use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;

use crate::config::{BrowserBuilder, BrowserConfig};
use crate::error::{Error, Result};
use crate::page::Page;
use crate::stealth;

/// Chrome flags that trim startup work without changing page behaviour.
const PERF_ARGS: &[&str] = &[
    "disable-extensions",
    "mute-audio",
    "disable-client-side-phishing-detection",
    "disable-popup-blocking",
];

/// A launched Chrome instance, exclusively owned by one login run.
pub struct ChromeSession {
    browser: CrBrowser,
    stealth: bool,
    default_timeout: std::time::Duration,
    handler_task: tokio::task::JoinHandle<()>,
    closed: bool,
}

impl ChromeSession {
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Launch a browser instance with the given configuration.
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let mut builder = CrBrowserConfig::builder();

        if config.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }

        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }

        // chromiumoxide adds the `--` prefix itself
        if config.stealth {
            for arg in stealth::stealth_key_args() {
                builder = builder.arg(arg);
            }
            for arg in stealth::stealth_kv_args() {
                builder = builder.arg(arg);
            }
        }

        for arg in &config.extra_args {
            builder = match arg.split_once('=') {
                Some((key, value)) => builder.arg((key, value)),
                None => builder.arg(arg.as_str()),
            };
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder.viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        });

        let cr_config = builder.build().map_err(Error::LaunchError)?;

        let (browser, mut handler) = CrBrowser::launch(cr_config)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        tracing::info!(headless = config.headless, "browser launched");

        Ok(Self {
            browser,
            stealth: config.stealth,
            default_timeout: config.default_timeout,
            handler_task,
            closed: false,
        })
    }

    /// Open a new tab at `url`, with the stealth script registered first.
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;

        if self.stealth {
            stealth::apply_stealth(&cr_page).await?;
        }

        if url != "about:blank" {
            cr_page
                .goto(url)
                .await
                .map_err(|e| Error::NavigationError(e.to_string()))?;
        }

        Ok(Page::new(cr_page, self.default_timeout))
    }

    /// Close the browser and reap the process. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        closed?;
        tracing::info!("browser closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
