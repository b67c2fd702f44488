use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::network::Cookie;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::keys::get_key_definition;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page as CrPage;
use chromiumoxide::page::ScreenshotParams;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum characters of visible page text included in a snapshot.
const SNAPSHOT_TEXT_LIMIT: usize = 3000;

/// An element the agent can act on, as reported by [`Page::snapshot`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InteractiveElement {
    pub index: usize,
    pub tag: String,
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Visible text, label, placeholder, or title; never a password value.
    #[serde(default)]
    pub label: String,
    /// Centre of the element's bounding box in CSS pixels.
    pub x: f64,
    pub y: f64,
}

impl InteractiveElement {
    pub fn selector(&self) -> String {
        index_selector(self.index)
    }
}

/// Selector resolving to the element with this snapshot index, valid until
/// the next snapshot re-indexes the page.
pub fn index_selector(index: usize) -> String {
    format!("[data-ai-index=\"{index}\"]")
}

/// What the agent sees of the page before each step.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub elements: Vec<InteractiveElement>,
    pub text: String,
}

impl PageSnapshot {
    /// Compact textual rendering for the model prompt.
    pub fn describe(&self) -> String {
        let mut out = format!("URL: {}\nTitle: {}\n\nInteractive elements:\n", self.url, self.title);
        if self.elements.is_empty() {
            out.push_str("(none)\n");
        }
        for el in &self.elements {
            out.push_str(&format!("[{}] <{}", el.index, el.tag));
            if !el.r#type.is_empty() {
                out.push_str(&format!(" type={}", el.r#type));
            }
            if !el.id.is_empty() {
                out.push_str(&format!(" id={}", el.id));
            }
            if !el.name.is_empty() {
                out.push_str(&format!(" name={}", el.name));
            }
            out.push('>');
            if !el.label.is_empty() {
                out.push_str(&format!(" \"{}\"", el.label));
            }
            out.push_str(&format!(" @({:.0},{:.0})\n", el.x, el.y));
        }
        out.push_str("\nVisible text:\n");
        out.push_str(&self.text);
        out
    }
}

/// Wrapper around a chromiumoxide Page exposing the actions the login agent uses.
pub struct Page {
    inner: CrPage,
    default_timeout: Duration,
}

impl Page {
    pub(crate) fn new(inner: CrPage, default_timeout: Duration) -> Self {
        Self { inner, default_timeout }
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Navigate to the given URL and wait for the page to load.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    pub async fn go_back(&self) -> Result<()> {
        self.inner
            .evaluate("window.history.back()")
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    // ── Actions ─────────────────────────────────────────────────────

    /// Click on an element matching the given CSS selector.
    pub async fn click(&self, selector: &str) -> Result<()> {
        let el = self.wait_for_selector(selector).await?;
        el.click().await?;
        Ok(())
    }

    /// Dispatch a mouse click at page coordinates. Used for cross-origin
    /// frames (reCAPTCHA) whose contents cannot be queried.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.inner.click(Point { x, y }).await?;
        Ok(())
    }

    /// Clear an element and type `text` one character at a time with short,
    /// uneven pauses. Characters with no US-keyboard key are inserted through
    /// `Input.insertText` instead of key events.
    pub async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let el = self.wait_for_selector(selector).await?;
        el.click().await?;
        el.call_js_fn("function() { if ('value' in this) this.value = ''; }", false)
            .await?;
        for (i, ch) in text.chars().enumerate() {
            let mut buf = [0u8; 4];
            let key: &str = ch.encode_utf8(&mut buf);
            if has_key(key) {
                el.type_str(key).await?;
            } else {
                self.inner.execute(InsertTextParams::new(key)).await?;
            }
            tokio::time::sleep(keystroke_delay(i)).await;
        }
        Ok(())
    }

    /// Lower-cased `type` attribute of the element, empty when it has none.
    pub async fn input_type(&self, selector: &str) -> Result<String> {
        let el = self.wait_for_selector(selector).await?;
        Ok(el
            .attribute("type")
            .await?
            .unwrap_or_default()
            .to_ascii_lowercase())
    }

    /// Press a key (e.g. "Enter", "Tab") on the focused element.
    pub async fn press_key(&self, key: &str) -> Result<()> {
        let el = match self.inner.find_element(":focus").await {
            Ok(el) => el,
            Err(_) => self.find_element("body").await?,
        };
        el.press_key(key).await?;
        Ok(())
    }

    /// Scroll vertically; negative values scroll up.
    pub async fn scroll_by(&self, pixels: i64) -> Result<()> {
        self.evaluate_void(&format!("window.scrollBy(0, {pixels})")).await
    }

    /// Wait for an element matching the selector to appear in the DOM.
    /// Polls every 100ms up to the configured default timeout.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<Element> {
        let timeout = self.default_timeout;
        let interval = Duration::from_millis(100);
        let start = std::time::Instant::now();

        loop {
            match self.find_element(selector).await {
                Ok(el) => return Ok(el),
                Err(_) if start.elapsed() < timeout => {
                    tokio::time::sleep(interval).await;
                }
                Err(_) => {
                    return Err(Error::Timeout(format!(
                        "Timed out waiting for selector: {selector}"
                    )));
                }
            }
        }
    }

    // ── Observations ────────────────────────────────────────────────

    /// Take a screenshot of the visible viewport (PNG format).
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.inner
            .screenshot(params)
            .await
            .map_err(|e| Error::ScreenshotError(e.to_string()))
    }

    /// Cookies visible to the current page.
    pub async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.inner.get_cookies().await?)
    }

    /// Index the visible interactive elements and capture the page text.
    pub async fn snapshot(&self) -> Result<PageSnapshot> {
        let result = self
            .inner
            .evaluate(SNAPSHOT_JS)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        let json: String = result
            .into_value()
            .map_err(|e| Error::JsError(e.to_string()))?;
        let mut snapshot: PageSnapshot = serde_json::from_str(&json)?;
        if snapshot.text.chars().count() > SNAPSHOT_TEXT_LIMIT {
            snapshot.text = snapshot.text.chars().take(SNAPSHOT_TEXT_LIMIT).collect();
        }
        Ok(snapshot)
    }

    /// Evaluate a JavaScript expression without caring about the return value.
    pub async fn evaluate_void(&self, expression: &str) -> Result<()> {
        self.inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }

    pub async fn find_element(&self, selector: &str) -> Result<Element> {
        self.inner
            .find_element(selector)
            .await
            .map_err(|e| Error::ElementNotFound(format!("{selector}: {e}")))
    }
}

/// Page operations the agent loop drives. [`Page`] is the live implementation.
#[async_trait]
pub trait AgentPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;
    async fn go_back(&self) -> Result<()>;
    async fn url(&self) -> Result<String>;
    async fn click(&self, selector: &str) -> Result<()>;
    async fn click_at(&self, x: f64, y: f64) -> Result<()>;
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;
    async fn input_type(&self, selector: &str) -> Result<String>;
    async fn press_key(&self, key: &str) -> Result<()>;
    async fn scroll_by(&self, pixels: i64) -> Result<()>;
    async fn snapshot(&self) -> Result<PageSnapshot>;
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

#[async_trait]
impl AgentPage for Page {
    async fn goto(&self, url: &str) -> Result<()> {
        Page::goto(self, url).await
    }

    async fn go_back(&self) -> Result<()> {
        Page::go_back(self).await
    }

    async fn url(&self) -> Result<String> {
        Page::url(self).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        Page::click(self, selector).await
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        Page::click_at(self, x, y).await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        Page::type_text(self, selector, text).await
    }

    async fn input_type(&self, selector: &str) -> Result<String> {
        Page::input_type(self, selector).await
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        Page::press_key(self, key).await
    }

    async fn scroll_by(&self, pixels: i64) -> Result<()> {
        Page::scroll_by(self, pixels).await
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        Page::snapshot(self).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Page::screenshot(self).await
    }
}

/// Whether chromiumoxide can send `key` as key events.
fn has_key(key: &str) -> bool {
    get_key_definition(key).is_some()
}

fn keystroke_delay(i: usize) -> Duration {
    Duration::from_millis(45 + (i as u64 * 37) % 60)
}

static SNAPSHOT_JS: &str = r#"
JSON.stringify((() => {
    document.querySelectorAll('[data-ai-index]').forEach(el => el.removeAttribute('data-ai-index'));
    const query = 'a[href], button, input, select, textarea, iframe, [role="button"], [role="checkbox"], [onclick]';
    const elements = [];
    let index = 0;
    for (const el of document.querySelectorAll(query)) {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        if (rect.width === 0 || rect.height === 0) continue;
        if (style.display === 'none' || style.visibility === 'hidden') continue;
        if (el.tagName === 'INPUT' && el.type === 'hidden') continue;
        el.setAttribute('data-ai-index', String(index));
        let label = el.getAttribute('aria-label') || '';
        if (!label && el.id) {
            const forLabel = document.querySelector(`label[for="${el.id}"]`);
            if (forLabel) label = forLabel.innerText || '';
        }
        if (!label && el.tagName !== 'INPUT') label = el.innerText || '';
        if (!label && el.type !== 'password' && (el.type === 'submit' || el.type === 'button')) label = el.value || '';
        if (!label) label = el.placeholder || el.title || el.src || '';
        elements.push({
            index: index,
            tag: el.tagName.toLowerCase(),
            type: el.type || '',
            id: el.id || '',
            name: el.name || '',
            label: label.trim().replace(/\s+/g, ' ').substring(0, 80),
            x: rect.left + rect.width / 2,
            y: rect.top + rect.height / 2,
        });
        index += 1;
    }
    return {
        url: location.href,
        title: document.title,
        elements: elements,
        text: document.body ? document.body.innerText : '',
    };
})())
"#;


#[cfg(test)]
mod tests {
    use super::*;

    fn element(index: usize, tag: &str, r#type: &str, id: &str, label: &str) -> InteractiveElement {
        InteractiveElement {
            index,
            tag: tag.into(),
            r#type: r#type.into(),
            id: id.into(),
            name: String::new(),
            label: label.into(),
            x: 10.0,
            y: 20.0,
        }
    }

    #[test]
    fn selector_targets_index_attribute() {
        let el = element(3, "input", "text", "login_user_cd", "");
        assert_eq!(el.selector(), "[data-ai-index=\"3\"]");
    }

    #[test]
    fn describe_lists_elements() {
        let snapshot = PageSnapshot {
            url: "https://portal/logins".into(),
            title: "Login".into(),
            elements: vec![
                element(0, "input", "password", "login_password", ""),
                element(1, "button", "submit", "", "ログイン"),
            ],
            text: "ようこそ".into(),
        };
        let text = snapshot.describe();
        assert!(text.contains("URL: https://portal/logins"));
        assert!(text.contains("[0] <input type=password id=login_password> @(10,20)"));
        assert!(text.contains("[1] <button type=submit> \"ログイン\""));
        assert!(text.ends_with("ようこそ"));
    }

    #[test]
    fn snapshot_json_tolerates_missing_optional_fields() {
        let json = r#"{"url":"about:blank","title":"","elements":[{"index":0,"tag":"a","x":1,"y":2}],"text":""}"#;
        let snapshot: PageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.elements[0].tag, "a");
        assert!(snapshot.elements[0].label.is_empty());
    }

    #[test]
    fn non_keyboard_characters_use_insert_text() {
        for key in ["a", "Z", "7", "!", "~", "@"] {
            assert!(has_key(key), "{key}");
        }
        for key in ["é", "パ", "ス", "あ", "€"] {
            assert!(!has_key(key), "{key}");
        }
    }

    #[test]
    fn keystroke_delays_vary() {
        assert_ne!(keystroke_delay(0), keystroke_delay(1));
        assert!(keystroke_delay(7) < Duration::from_millis(110));
    }
}
