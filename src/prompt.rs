use std::fmt;
use std::str::FromStr;

use crate::classify::ClassifierRules;
use crate::error::Error;
use crate::secret::SensitiveData;

/// Name under which the login password is handed to the agent.
pub const PASSWORD_SECRET: &str = "password";

/// Portals this tool knows how to log in to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Ibj,
}

impl Vendor {
    pub fn key(&self) -> &'static str {
        match self {
            Vendor::Ibj => "ibj",
        }
    }

    /// How a finished run is judged for this portal.
    pub fn classifier_rules(&self) -> ClassifierRules {
        match self {
            Vendor::Ibj => ClassifierRules::ibj(),
        }
    }

    /// Instructions for the agent. The password is referenced by placeholder
    /// and never interpolated.
    pub fn login_task(&self, username: &str, login_url: &str) -> String {
        let steps = match self {
            Vendor::Ibj => ibj_steps(username, login_url),
        };
        let password = SensitiveData::placeholder(PASSWORD_SECRET);
        format!(
            "{steps}
IMPORTANT: For the password field, type exactly {password} as the text.
It is replaced with the real password when typed; you will never see it.
"
        )
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "ibj" => Ok(Vendor::Ibj),
            other => Err(Error::UnsupportedVendor(other.to_string())),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Build the agent task for `vendor_key`, or fail with `UnsupportedVendor`.
pub fn build_task(vendor_key: &str, username: &str, login_url: &str) -> Result<String, Error> {
    let vendor: Vendor = vendor_key.parse()?;
    Ok(vendor.login_task(username, login_url))
}

fn ibj_steps(username: &str, login_url: &str) -> String {
    format!(
        r#"
Navigate to {login_url} and perform login with the following steps.
Be patient and wait for elements to load before interacting.

IMPORTANT: Act like a human user. Move naturally, wait between actions.

Steps:
1. Wait for the login page to fully load (look for the login form)

2. Find the user ID input field (look for input with id "login_user_cd" or
   label containing "ユーザーID" or "ログインID")
   - Click on it first
   - Then type the username: {username}

3. Find the password input field (look for input with id "login_password" or
   type="password")
   - Click on it first
   - Then type the password (see below)

4. Look for a reCAPTCHA checkbox (iframe containing "recaptcha" or checkbox
   with text like "I'm not a robot" / "私はロボットではありません")
   - If found, click the checkbox
   - Wait to see if an image challenge appears
   - If image challenge appears, solve it by selecting the correct images

5. Find and click the login button (look for green button with text "ログイン"
   or input/button with value="ログイン")

6. Wait for the page to navigate away from the login page
   - Success indicators: URL changes from /logins, or you see elements like
     "マイページ", user name display, or OTP input page

7. If you see an OTP/verification code page, that means login was successful
   - Report success - the OTP will be handled separately

Report your progress and any errors encountered.
If login fails (wrong credentials, CAPTCHA failure), report the error message.
"#
    )
}
