use std::collections::HashMap;

use zeroize::Zeroizing;

/// String holding secret material. Zeroized on drop, redacted in `Debug`.
#[derive(Default)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.0.as_str())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Named secrets the agent may type without ever seeing them.
///
/// The model refers to a secret as `<secret>name</secret>`; the placeholder is
/// swapped for the real value only when text is typed into the page.
#[derive(Clone, Debug, Default)]
pub struct SensitiveData {
    values: HashMap<String, SecretString>,
}

impl SensitiveData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: SecretString) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// The placeholder the model should emit for `name`.
    pub fn placeholder(name: &str) -> String {
        format!("<secret>{name}</secret>")
    }

    /// Names of the secrets that are available, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether `text` mentions the placeholder of any known secret.
    pub fn has_placeholder(&self, text: &str) -> bool {
        self.values
            .keys()
            .any(|name| text.contains(&Self::placeholder(name)))
    }

    /// Replace every known placeholder in `text` with its secret value.
    pub fn resolve(&self, text: &str) -> Zeroizing<String> {
        let mut out = Zeroizing::new(text.to_string());
        for (name, value) in &self.values {
            let placeholder = Self::placeholder(name);
            if out.contains(&placeholder) {
                *out = out.replace(&placeholder, value.expose());
            }
        }
        out
    }

    /// Replace every secret value occurring in `text` with its placeholder.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (name, value) in &self.values {
            if !value.is_empty() && out.contains(value.expose()) {
                out = out.replace(value.expose(), &Self::placeholder(name));
            }
        }
        out
    }
}
