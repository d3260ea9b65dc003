use std::time::Duration;

use crate::{messages::Locale, relay::RetryPolicy};

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_TEXT_MODEL: &str = "openai/gpt-5-mini";
pub const DEFAULT_IMAGE_MODEL: &str = "google/gemini-2.5-flash-image";

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub referer: String,
    pub title: String,
    pub default_locale: Locale,
    pub port: u16,
    pub enhance_retry: RetryPolicy,
    pub image_retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let attempt_timeout = Duration::from_secs(90);
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            referer: "https://yasmine-al-sham-designer.com".to_string(),
            title: "Yasmine Al-Sham Smart Designer".to_string(),
            default_locale: Locale::En,
            port: 8080,
            enhance_retry: RetryPolicy::fixed(3, Duration::from_secs(2), attempt_timeout),
            image_retry: RetryPolicy::fixed(3, Duration::from_secs(3), attempt_timeout),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or blank values keep the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Config::default();

        cfg.api_key = get("OPENROUTER_API_KEY");
        if let Some(v) = get("OPENROUTER_API_BASE") { cfg.api_base = v.trim_end_matches('/').to_string(); }
        if let Some(v) = get("TEXT_MODEL") { cfg.text_model = v; }
        if let Some(v) = get("IMAGE_MODEL") { cfg.image_model = v; }
        if let Some(v) = get("APP_REFERER") { cfg.referer = v; }
        if let Some(v) = get("APP_TITLE") { cfg.title = v; }
        match get("RELAY_LOCALE").map(|v| v.parse::<Locale>()) {
            Some(Ok(locale)) => cfg.default_locale = locale,
            Some(Err(e)) => tracing::warn!("Ignoring RELAY_LOCALE: {}", e),
            None => {}
        }
        if let Some(secs) = get("RELAY_ATTEMPT_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            let timeout = Duration::from_secs(secs.max(1));
            cfg.enhance_retry.attempt_timeout = timeout;
            cfg.image_retry.attempt_timeout = timeout;
        }
        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) { cfg.port = port; }
        cfg
    }

    /// Masked key prefix for startup logging.
    pub fn api_key_hint(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}...", key.chars().take(10).collect::<String>()),
            None => "<unset>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_relay_constants() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.enhance_retry.max_attempts, 3);
        assert_eq!(cfg.enhance_retry.delay, Duration::from_secs(2));
        assert_eq!(cfg.image_retry.delay, Duration::from_secs(3));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.api_key_hint(), "<unset>");
    }

    #[test]
    fn blank_key_counts_as_unset() {
        let cfg = Config::from_lookup(lookup(&[("OPENROUTER_API_KEY", "   ")]));
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-or-v1-abcdefghijkl"),
            ("OPENROUTER_API_BASE", "http://localhost:9000/v1/"),
            ("RELAY_LOCALE", "ar"),
            ("RELAY_ATTEMPT_TIMEOUT_SECS", "15"),
            ("PORT", "3001"),
        ]));
        assert_eq!(cfg.api_base, "http://localhost:9000/v1");
        assert_eq!(cfg.default_locale, Locale::Ar);
        assert_eq!(cfg.image_retry.attempt_timeout, Duration::from_secs(15));
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.api_key_hint(), "sk-or-v1-a...");
    }
}
