//! Process configuration, read once from the environment at startup.
//!
//! A `.env` file in the working directory is honoured outside of tests.

use std::net::SocketAddr;

/// Failure to assemble a [`Config`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing the environment variable {0}")]
    MissingVar(String),
    #[error("invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection parameters of the hosted backend.
#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub database_url: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    pub measurement_id: String,
}

#[derive(Clone, Debug)]
pub struct OAuthKeys {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub public_url: String,
    pub session_idle_minutes: i64,
    pub backend: BackendConfig,
    pub google: Option<OAuthKeys>,
    pub github: Option<OAuthKeys>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenv::dotenv().ok();
        }
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_owned());

        let bind_address = or("BIND_ADDRESS", "0.0.0.0:8080");
        let bind_address = bind_address.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_owned(), e.to_string())
        })?;

        let public_url = or("PUBLIC_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_owned();

        let idle = or("SESSION_IDLE_MINUTES", "30");
        let session_idle_minutes = idle
            .parse::<i64>()
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SESSION_IDLE_MINUTES".to_owned(),
                    format!("'{idle}' is not a positive number of minutes"),
                )
            })?;

        let backend = BackendConfig {
            api_key: var("FIREBASE_API_KEY")
                .ok_or_else(|| ConfigError::MissingVar("FIREBASE_API_KEY".to_owned()))?,
            auth_domain: or("FIREBASE_AUTH_DOMAIN", "localhost"),
            database_url: or("DATABASE_URL", "sqlite://hearth.db?mode=rwc"),
            project_id: or("FIREBASE_PROJECT_ID", ""),
            storage_bucket: or("FIREBASE_STORAGE_BUCKET", ""),
            messaging_sender_id: or("FIREBASE_MESSAGING_SENDER_ID", ""),
            app_id: or("FIREBASE_APP_ID", ""),
            measurement_id: or("FIREBASE_MEASUREMENT_ID", ""),
        };

        let keys = |id_key: &str, secret_key: &str| -> Result<Option<OAuthKeys>, ConfigError> {
            match (var(id_key), var(secret_key)) {
                (None, None) => Ok(None),
                (Some(client_id), Some(client_secret)) => Ok(Some(OAuthKeys { client_id, client_secret })),
                (Some(_), None) => Err(ConfigError::MissingVar(secret_key.to_owned())),
                (None, Some(_)) => Err(ConfigError::MissingVar(id_key.to_owned())),
            }
        };

        Ok(Self {
            bind_address,
            public_url,
            session_idle_minutes,
            backend,
            google: keys("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET")?,
            github: keys("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_api_key_is_set() {
        let config = load(&[("FIREBASE_API_KEY", "key")]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.public_url, "http://localhost:8080");
        assert_eq!(config.session_idle_minutes, 30);
        assert_eq!(config.backend.api_key, "key");
        assert_eq!(config.backend.database_url, "sqlite://hearth.db?mode=rwc");
        assert!(config.google.is_none());
        assert!(config.github.is_none());
    }

    #[test]
    fn api_key_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "FIREBASE_API_KEY"));
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let err = load(&[("FIREBASE_API_KEY", "key"), ("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "BIND_ADDRESS"));
    }

    #[test]
    fn zero_idle_minutes_is_rejected() {
        let err = load(&[("FIREBASE_API_KEY", "key"), ("SESSION_IDLE_MINUTES", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "SESSION_IDLE_MINUTES"));
    }

    #[test]
    fn provider_keys_come_in_pairs() {
        let config = load(&[
            ("FIREBASE_API_KEY", "key"),
            ("GOOGLE_CLIENT_ID", "gid"),
            ("GOOGLE_CLIENT_SECRET", "gsecret"),
            ("PUBLIC_URL", "https://chat.example.com/"),
        ])
        .unwrap();
        let google = config.google.unwrap();
        assert_eq!(google.client_id, "gid");
        assert_eq!(google.client_secret, "gsecret");
        assert_eq!(config.public_url, "https://chat.example.com");

        let err = load(&[("FIREBASE_API_KEY", "key"), ("GITHUB_CLIENT_ID", "id")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "GITHUB_CLIENT_SECRET"));
    }
}
