use std::io::Write;
use std::process::ExitCode;

use serde::Serialize;

use crate::extract::CookieRecord;

/// Either the cookies of a logged-in session or the reason there is none.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Success { cookies: Vec<CookieRecord> },
    Failure { error: String },
}

/// The single result of one login run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResult {
    pub outcome: LoginOutcome,
    /// Base64-encoded debug screenshots, oldest first.
    pub screenshots: Vec<String>,
}

#[derive(Serialize)]
struct WireResult<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cookies: Option<&'a [CookieRecord]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "no_screenshots")]
    screenshots: &'a [String],
}

fn no_screenshots(screenshots: &&[String]) -> bool {
    screenshots.is_empty()
}

impl LoginResult {
    pub fn success(cookies: Vec<CookieRecord>) -> Self {
        Self {
            outcome: LoginOutcome::Success { cookies },
            screenshots: Vec::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            outcome: LoginOutcome::Failure {
                error: error.into(),
            },
            screenshots: Vec::new(),
        }
    }

    pub fn with_screenshots(mut self, screenshots: Vec<String>) -> Self {
        self.screenshots = screenshots;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LoginOutcome::Success { .. })
    }

    pub fn cookies(&self) -> Option<&[CookieRecord]> {
        match &self.outcome {
            LoginOutcome::Success { cookies } => Some(cookies),
            LoginOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            LoginOutcome::Success { .. } => None,
            LoginOutcome::Failure { error } => Some(error),
        }
    }

    /// Process exit status: 0 on success, 1 on any failure.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Compact single-line JSON: `{success, cookies | error, screenshots?}`.
    pub fn to_json_line(&self) -> String {
        let wire = WireResult {
            success: self.is_success(),
            cookies: self.cookies(),
            error: self.error(),
            screenshots: &self.screenshots,
        };
        // Plain strings, bools and integers only; serialization cannot fail.
        serde_json::to_string(&wire).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": format!("failed to serialize result: {e}"),
            })
            .to_string()
        })
    }
}

/// Write the result as one line and return the matching exit status.
pub fn report(result: &LoginResult, out: &mut impl Write) -> std::io::Result<ExitCode> {
    writeln!(out, "{}", result.to_json_line())?;
    out.flush()?;
    Ok(ExitCode::from(result.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SameSite;
    use pretty_assertions::assert_eq;

    fn cookie() -> CookieRecord {
        CookieRecord {
            name: "sid".into(),
            value: "abc".into(),
            domain: "portal.example".into(),
            path: "/".into(),
            expires: -1,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }

    #[test]
    fn failure_shape() {
        let result = LoginResult::failure("Unsupported vendor: acme");
        assert_eq!(
            result.to_json_line(),
            r#"{"success":false,"error":"Unsupported vendor: acme"}"#
        );
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn success_shape_with_screenshot() {
        let result = LoginResult::success(vec![cookie()]).with_screenshots(vec!["iVBO".into()]);
        let value: serde_json::Value = serde_json::from_str(&result.to_json_line()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["cookies"][0]["name"], "sid");
        assert_eq!(value["cookies"][0]["httpOnly"], true);
        assert_eq!(value["screenshots"][0], "iVBO");
        assert!(value.get("error").is_none());
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn success_with_no_cookies_still_has_cookie_list() {
        let line = LoginResult::success(Vec::new()).to_json_line();
        assert_eq!(line, r#"{"success":true,"cookies":[]}"#);
    }

    #[test]
    fn report_is_single_line_and_repeatable() {
        let result = LoginResult::success(vec![cookie()]);
        let mut first = Vec::new();
        let mut second = Vec::new();
        report(&result, &mut first).unwrap();
        report(&result, &mut second).unwrap();
        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn field_order_is_stable() {
        let line = LoginResult::failure("x")
            .with_screenshots(vec!["a".into()])
            .to_json_line();
        assert_eq!(line, r#"{"success":false,"error":"x","screenshots":["a"]}"#);
    }
}
