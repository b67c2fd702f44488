use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page as CrPage;

use crate::error::{Error, Result};

/// User agent presented in stealth mode (desktop Chrome on Windows).
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

/// Key-only Chrome flags added in stealth mode, without the `--` prefix.
pub fn stealth_key_args() -> Vec<&'static str> {
    vec![
        "disable-infobars",
        "disable-default-apps",
        "no-first-run",
        "no-default-browser-check",
    ]
}

/// Key-value Chrome flags added in stealth mode.
pub fn stealth_kv_args() -> Vec<(&'static str, &'static str)> {
    vec![("user-agent", STEALTH_USER_AGENT), ("lang", "ja-JP")]
}

/// Register the evasion script so it runs before any site script on every
/// document the page loads, including the reCAPTCHA frame's parent.
pub async fn apply_stealth(page: &CrPage) -> Result<()> {
    let params = AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS);
    page.execute(params)
        .await
        .map_err(|e| Error::JsError(format!("Failed to inject stealth script: {e}")))?;
    Ok(())
}

static STEALTH_JS: &str = r#"
Object.defineProperty(Navigator.prototype, 'webdriver', {
    get: () => false,
    configurable: true,
});

if (!window.chrome) {
    window.chrome = { runtime: {}, loadTimes: () => ({}), csi: () => ({}) };
}

Object.defineProperty(navigator, 'languages', {
    get: () => ['ja-JP', 'ja', 'en-US', 'en'],
    configurable: true,
});

if (navigator.plugins.length === 0) {
    const plugins = Object.create(PluginArray.prototype);
    ['Chrome PDF Plugin', 'Chrome PDF Viewer', 'Native Client'].forEach((name, i) => {
        const plugin = Object.create(Plugin.prototype);
        Object.defineProperty(plugin, 'name', { value: name, enumerable: true });
        plugins[i] = plugin;
    });
    Object.defineProperty(plugins, 'length', { value: 3 });
    Object.defineProperty(navigator, 'plugins', { get: () => plugins, configurable: true });
}

if (!navigator.hardwareConcurrency) {
    Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 8, configurable: true });
}

const permissionsQuery = window.Permissions && window.Permissions.prototype.query;
if (permissionsQuery) {
    window.Permissions.prototype.query = function(parameters) {
        if (parameters && parameters.name === 'notifications') {
            return Promise.resolve({ state: Notification.permission });
        }
        return permissionsQuery.call(this, parameters);
    };
}

for (const ctx of [window.WebGLRenderingContext, window.WebGL2RenderingContext]) {
    if (!ctx) continue;
    const getParameter = ctx.prototype.getParameter;
    ctx.prototype.getParameter = function(param) {
        if (param === 0x9245) return 'Google Inc. (Intel)';
        if (param === 0x9246) return 'ANGLE (Intel, Intel(R) UHD Graphics 620 Direct3D11 vs_5_0 ps_5_0, D3D11)';
        return getParameter.call(this, param);
    };
}

if (window.outerWidth === 0) {
    Object.defineProperty(window, 'outerWidth', { get: () => window.innerWidth });
    Object.defineProperty(window, 'outerHeight', { get: () => window.innerHeight + 85 });
}
"#;
