use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use client_core::{suggest::DEFAULT_GEMINI_MODEL, SessionStore};

pub const DEFAULT_CONFIG_FILE: &str = "admin.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: Option<String>,
    pub session_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api/v1".into(),
            request_timeout_secs: 30,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
            gemini_base_url: None,
            session_file: SessionStore::default_path(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Defaults, then `admin.toml` (if readable), then environment overrides.
pub fn load_settings(config_file: &Path) -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(config_file) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    let text = |key: &str| file_cfg.get(key).and_then(|v| v.as_str()).map(str::to_owned);

    if let Some(v) = text("api_base_url") {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg
        .get("request_timeout_secs")
        .and_then(|v| v.as_integer())
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = text("gemini_api_key") {
        settings.gemini_api_key = Some(v);
    }
    if let Some(v) = text("gemini_model") {
        settings.gemini_model = v;
    }
    if let Some(v) = text("gemini_base_url") {
        settings.gemini_base_url = Some(v);
    }
    if let Some(v) = text("session_file") {
        settings.session_file = PathBuf::from(v);
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = var("GEMINI_API_KEY") {
        settings.gemini_api_key = Some(v);
    }
    if let Some(v) = var("APP__GEMINI_API_KEY") {
        settings.gemini_api_key = Some(v);
    }

    if let Some(v) = var("APP__GEMINI_MODEL") {
        settings.gemini_model = v;
    }
    if let Some(v) = var("APP__GEMINI_BASE_URL") {
        settings.gemini_base_url = Some(v);
    }

    if let Some(v) = var("APP__SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }

    settings.gemini_api_key = settings
        .gemini_api_key
        .take()
        .filter(|key| !key.trim().is_empty());
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
api_base_url = "https://api.example.org/api/v1"
request_timeout_secs = 5
gemini_model = "gemini-2.0-flash"
session_file = "/tmp/ngo-session.toml"
"#,
        );
        assert_eq!(settings.api_base_url, "https://api.example.org/api/v1");
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.gemini_model, "gemini-2.0-flash");
        assert_eq!(settings.session_file, PathBuf::from("/tmp/ngo-session.toml"));
        assert_eq!(settings.gemini_api_key, None);
    }

    #[test]
    fn prefixed_env_wins_over_legacy_names() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            vars(&[
                ("API_BASE_URL", "http://legacy"),
                ("APP__API_BASE_URL", "http://prefixed"),
                ("GEMINI_API_KEY", "legacy-key"),
                ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
            ]),
        );
        assert_eq!(settings.api_base_url, "http://prefixed");
        assert_eq!(settings.gemini_api_key.as_deref(), Some("legacy-key"));
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn blank_gemini_key_counts_as_missing() {
        let mut settings = Settings::default();
        apply_env(&mut settings, vars(&[("APP__GEMINI_API_KEY", "  ")]));
        assert_eq!(settings.gemini_api_key, None);
    }

    #[test]
    fn unreadable_file_keeps_defaults() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let root = env::temp_dir().join(format!("ngo_admin_config_test_{suffix}"));
        fs::create_dir_all(&root).expect("temp root");
        let path = root.join("admin.toml");
        fs::write(&path, "this is = = not toml").expect("write");

        let mut settings = Settings::default();
        apply_file(&mut settings, &fs::read_to_string(&path).expect("read"));
        assert_eq!(settings, Settings::default());

        fs::remove_dir_all(root).expect("cleanup");
    }
}
