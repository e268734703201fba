//! Listener configuration.

use portal_auth::ConfigError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

/// Address the HTTP server binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Load from `HOST` and `PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a blank host or a port that is
    /// not a number between 0 and 65535.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup<G>(get: G) -> Result<Self, ConfigError>
    where
        G: Fn(&str) -> Option<String>,
    {
        let host = match get("HOST") {
            Some(host) if host.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    var: "HOST",
                    reason: "must not be blank".to_string(),
                });
            }
            Some(host) => host.trim().to_string(),
            None => DEFAULT_HOST.to_string(),
        };

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                reason: format!("expected a port number, got '{raw}'"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self { host, port })
    }

    /// `host:port` for the listener.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
