use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    error::ConfigError,
    pagination_utils::{pagination_controller::DEFAULT_MIN_QUERY_LEN, DEFAULT_PAGE_SIZE},
};

const DEFAULT_CONFIG_REL_PATH: &str = "repo_search.toml";
const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";
const ANILIST_GRAPHQL_ENDPOINT: &str = "https://graphql.anilist.co";

/// Runtime settings.
///
/// Built from defaults, then an optional TOML file, then environment
/// variables (a `.env` file is loaded by `main` beforehand):
/// 1. **REPO_SEARCH_CONFIG**, path of the TOML file, defaults to *repo_search.toml*.
/// 2. **GH_API_KEY**, token sent as `Bearer` authorization.
/// 3. **GH_API_USER_AGENT**, user agent required by the github api.
/// 4. **GH_API_ENDPOINT**, graphql endpoint.
/// 5. **ANILIST_API_ENDPOINT**, graphql endpoint of the anime list.
/// 6. **REPO_SEARCH_PAGE_SIZE**, items requested per page.
///
/// The result is checked once by [`Settings::validate`], whichever layer a
/// value came from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub anilist_endpoint: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub api_version: String,
    pub page_size: u32,
    pub min_query_len: usize,
    /// Base delay between two requests, doubled after a failed one.
    pub min_request_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            endpoint: GITHUB_GRAPHQL_ENDPOINT.to_owned(),
            anilist_endpoint: ANILIST_GRAPHQL_ENDPOINT.to_owned(),
            token: None,
            user_agent: format!("repo_search/{}", env!("CARGO_PKG_VERSION")),
            api_version: "2022-11-28".to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            min_query_len: DEFAULT_MIN_QUERY_LEN,
            min_request_interval_ms: 500,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Settings, ConfigError> {
        let explicit_path = std::env::var("REPO_SEARCH_CONFIG").ok();
        let path = explicit_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_REL_PATH.to_owned());

        // a missing default file is fine, a missing explicit one isn't
        let settings = if explicit_path.is_some() || Path::new(&path).exists() {
            info!("Reading settings from {path}");
            Settings::from_file(&path)?
        } else {
            Settings::default()
        };
        settings.apply_env(|key| std::env::var(key).ok())?.validate()
    }

    pub fn from_file(path: &str) -> Result<Settings, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Overrides fields with the variables found by `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("GH_API_KEY").filter(|token| !token.is_empty()) {
            self.token = Some(token);
        }
        if let Some(user_agent) = lookup("GH_API_USER_AGENT") {
            self.user_agent = user_agent;
        }
        if let Some(endpoint) = lookup("GH_API_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("ANILIST_API_ENDPOINT") {
            self.anilist_endpoint = endpoint;
        }
        if let Some(page_size) = lookup("REPO_SEARCH_PAGE_SIZE") {
            self.page_size = page_size
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidEnv {
                    key: "REPO_SEARCH_PAGE_SIZE".to_owned(),
                    value: page_size,
                })?;
        }
        if self.token.is_none() {
            warn!("GH_API_KEY not set, requests will be sent without authorization");
        }
        Ok(self)
    }

    /// Rejects values no request could be built with.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_owned(),
            reason: reason.to_owned(),
        };
        if self.page_size == 0 {
            return Err(invalid("page_size", "must be greater than 0"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(invalid("endpoint", "can't be empty"));
        }
        if self.anilist_endpoint.trim().is_empty() {
            return Err(invalid("anilist_endpoint", "can't be empty"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn file_values_fill_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "page_size = 25\nuser_agent = \"crawler\"\n").unwrap();

        let settings = Settings::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.user_agent, "crawler");
        assert_eq!(settings.endpoint, GITHUB_GRAPHQL_ENDPOINT);
        assert_eq!(settings.anilist_endpoint, ANILIST_GRAPHQL_ENDPOINT);
        assert_eq!(settings.min_query_len, 3);
        assert_eq!(settings.token, None);
    }

    #[test]
    fn broken_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "page_size = \"many\"").unwrap();

        let err = Settings::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(matches!(
            Settings::from_file("/definitely/not/here.toml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn env_overrides_file() {
        let settings = Settings::default()
            .apply_env(env(&[
                ("GH_API_KEY", "ghp_secret"),
                ("GH_API_ENDPOINT", "http://localhost:8080/graphql"),
                ("REPO_SEARCH_PAGE_SIZE", "50"),
            ]))
            .unwrap();
        assert_eq!(settings.token.as_deref(), Some("ghp_secret"));
        assert_eq!(settings.endpoint, "http://localhost:8080/graphql");
        assert_eq!(settings.page_size, 50);
    }

    #[test]
    fn empty_token_and_bad_page_size() {
        let settings = Settings::default()
            .apply_env(env(&[("GH_API_KEY", "")]))
            .unwrap();
        assert_eq!(settings.token, None);

        let err = Settings::default()
            .apply_env(env(&[("REPO_SEARCH_PAGE_SIZE", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));

        let err = Settings::default()
            .apply_env(env(&[("REPO_SEARCH_PAGE_SIZE", "0")]))
            .and_then(Settings::validate)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "page_size"));
    }

    #[test]
    fn zero_page_size_in_file_is_rejected_like_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "page_size = 0\n").unwrap();

        let settings = Settings::from_file(file.path().to_str().unwrap()).unwrap();
        let err = settings.apply_env(env(&[])).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "page_size"));

        let err = Settings {
            anilist_endpoint: " ".into(),
            ..Settings::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "anilist_endpoint"));
        assert!(Settings::default().validate().is_ok());
    }
}
