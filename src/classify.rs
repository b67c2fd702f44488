/// Error reported when neither signal indicates a completed login.
pub const STILL_ON_LOGIN_PAGE: &str = "Login did not complete successfully - still on login page";

/// Per-portal signals used to judge a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRules {
    /// Path segment present in the URL while still on the login page.
    pub login_path: &'static str,
    /// Substrings of the run history that indicate success.
    pub success_markers: &'static [&'static str],
}

impl ClassifierRules {
    pub fn ibj() -> Self {
        Self {
            login_path: "/logins",
            success_markers: &["OTP", "verification", "マイページ", "成功"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Decide whether the login went through.
///
/// A final URL away from the login path wins; otherwise any success marker in
/// the history text does. `final_url` is empty when it could not be read.
pub fn classify(final_url: &str, history_text: &str, rules: &ClassifierRules) -> Outcome {
    if !final_url.is_empty() && !final_url.contains(rules.login_path) {
        return Outcome::Success;
    }
    if rules
        .success_markers
        .iter()
        .any(|marker| history_text.contains(marker))
    {
        return Outcome::Success;
    }
    Outcome::Failure(STILL_ON_LOGIN_PAGE.to_string())
}
