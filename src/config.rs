use std::{env, num::NonZeroUsize, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::error::{ClientError, Result};

pub const DEFAULT_CLIENT_ID: &str = "client_1";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

const ENV_PREFIX: &str = "FL_";

/// Runtime configuration of a federated client.
///
/// Every field has a default, so a JSON file only needs to carry the keys it
/// wants to change.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: String,
    pub server_url: String,
    pub backend_url: String,
    pub epochs: NonZeroUsize,
    pub dataset_size: u64,
    pub rounds: usize,
    pub probe_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub epoch_delay_ms: u64,
    pub model_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            epochs: NonZeroUsize::new(3).unwrap_or(NonZeroUsize::MIN),
            dataset_size: 56,
            rounds: 10,
            probe_interval_secs: 10,
            request_timeout_secs: 30,
            epoch_delay_ms: 2000,
            model_path: None,
        }
    }
}

impl ClientConfig {
    /// Loads the configuration: defaults, then the optional JSON file, then the
    /// `FL_*` environment variables.
    ///
    /// # Arguments
    /// * `path` - Optional path to a JSON configuration file.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if the file cannot be read or parsed,
    /// an override cannot be parsed or the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };

        let config = config.with_overrides(env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;

        Self::from_json(&content)
    }

    /// Parses a configuration from a JSON document.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if the document is not valid.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ClientError::InvalidConfig(format!("invalid JSON: {e}")))
    }

    /// Applies `FL_*` overrides from a list of key/value pairs.
    ///
    /// Keys without the prefix or unknown keys are ignored.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if a numeric override cannot be parsed.
    pub fn with_overrides<I>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(key) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match key {
                "CLIENT_ID" => self.client_id = value,
                "SERVER_URL" => self.server_url = value,
                "BACKEND_URL" => self.backend_url = value,
                "EPOCHS" => self.epochs = parse_var(key, &value)?,
                "DATASET_SIZE" => self.dataset_size = parse_var(key, &value)?,
                "ROUNDS" => self.rounds = parse_var(key, &value)?,
                "PROBE_INTERVAL_SECS" => self.probe_interval_secs = parse_var(key, &value)?,
                "REQUEST_TIMEOUT_SECS" => self.request_timeout_secs = parse_var(key, &value)?,
                "EPOCH_DELAY_MS" => self.epoch_delay_ms = parse_var(key, &value)?,
                "MODEL_PATH" => self.model_path = Some(PathBuf::from(value)),
                _ => {}
            }
        }

        Ok(self)
    }

    /// Checks the values the orchestrator relies on.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("server_url", &self.server_url),
            ("backend_url", &self.backend_url),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ClientError::InvalidConfig(format!("{name} must not be empty")));
            }
        }

        check_url("server_url", &self.server_url)?;
        check_url("backend_url", &self.backend_url)?;

        if self.probe_interval_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "probe_interval_secs must be positive".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_secs must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn epoch_delay(&self) -> Duration {
        Duration::from_millis(self.epoch_delay_ms)
    }
}

/// Checks that a collaborator url carries an http(s) scheme.
///
/// # Errors
/// Returns `ClientError::InvalidConfig` naming `name` otherwise.
pub(crate) fn check_url(name: &str, url: &str) -> Result<()> {
    let url = url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ClientError::InvalidConfig(format!(
            "{name} must be an http(s) url, got '{url}'"
        )));
    }
    Ok(())
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ClientError::InvalidConfig(format!("{ENV_PREFIX}{key}='{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_collaborator_addresses() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "http://127.0.0.1:8000");
        assert_eq!(config.backend_url, "http://127.0.0.1:5000");
        assert_eq!(config.epochs.get(), 3);
        assert_eq!(config.probe_interval(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ClientConfig::from_json(r#"{ "client_id": "hospital_7", "epochs": 5 }"#)
            .unwrap();
        assert_eq!(config.client_id, "hospital_7");
        assert_eq!(config.epochs.get(), 5);
        assert_eq!(config.dataset_size, 56);
    }

    #[test]
    fn zero_epochs_is_rejected_by_the_parser() {
        assert!(ClientConfig::from_json(r#"{ "epochs": 0 }"#).is_err());
    }

    #[test]
    fn overrides_only_touch_prefixed_keys() {
        let config = ClientConfig::default()
            .with_overrides(vars(&[
                ("FL_SERVER_URL", "http://10.0.0.2:8000"),
                ("FL_ROUNDS", "2"),
                ("SERVER_URL", "http://ignored"),
                ("FL_UNKNOWN", "whatever"),
            ]))
            .unwrap();

        assert_eq!(config.server_url, "http://10.0.0.2:8000");
        assert_eq!(config.rounds, 2);
    }

    #[test]
    fn bad_numeric_override_is_an_error() {
        let err = ClientConfig::default()
            .with_overrides(vars(&[("FL_EPOCHS", "three")]))
            .unwrap_err();
        assert!(err.to_string().contains("FL_EPOCHS"));
    }

    #[test]
    fn validation_rejects_empty_identity_and_bad_urls() {
        let config = ClientConfig {
            client_id: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            server_url: "127.0.0.1:8000".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            probe_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
