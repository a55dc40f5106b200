//! Backend connection settings.

/// Environment variable holding the backend base URL.
pub const BACKEND_URL_VAR: &str = "INFINICANVAS_BACKEND_URL";

/// Environment variable holding the public (anonymous) API key.
pub const BACKEND_ANON_KEY_VAR: &str = "INFINICANVAS_BACKEND_ANON_KEY";

/// Where the backend lives and the key every request carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
        }
    }

    /// Read the configuration from the environment. Missing variables are
    /// left empty.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup(BACKEND_URL_VAR).unwrap_or_default(),
            anon_key: lookup(BACKEND_ANON_KEY_VAR).unwrap_or_default(),
        }
    }

    /// True only when both the URL and the key are set.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configured() {
        assert!(BackendConfig::new("http://localhost:3030", "key").is_configured());
        assert!(!BackendConfig::new("", "key").is_configured());
        assert!(!BackendConfig::new("http://localhost:3030", " ").is_configured());
        assert!(!BackendConfig::default().is_configured());
    }

    #[test]
    fn test_from_lookup() {
        let config = BackendConfig::from_lookup(|name| match name {
            BACKEND_URL_VAR => Some("https://example.test".to_string()),
            _ => None,
        });
        assert_eq!(config.url, "https://example.test");
        assert_eq!(config.anon_key, "");
        assert!(!config.is_configured());
    }
}
