//! Startup configuration.
//!
//! Everything comes from environment variables, optionally seeded from a
//! `.env` file in the working directory. The VAPID keypair is
//! mandatory: without it the relay has no signing identity, so loading fails
//! and the process exits before binding a socket.
//!
//! | Variable             | Default                      |
//! |----------------------|------------------------------|
//! | `VAPID_PUBLIC_KEY`   | required                     |
//! | `VAPID_PRIVATE_KEY`  | required                     |
//! | `PORT`               | `8080`                       |
//! | `BIND_ADDR`          | `0.0.0.0`                    |
//! | `SUBSCRIPTIONS_FILE` | `data/subscriptions.json`    |
//! | `VAPID_SUBJECT`      | `mailto:admin@example.com`   |
//! | `PUSH_TTL`           | `30`                         |
//! | `STATIC_DIR`         | `./static`                   |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::notifications::VapidKeys;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default TTL hint (seconds) passed to the push service.
pub const DEFAULT_PUSH_TTL: u32 = 30;

/// Fatal configuration problem.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set (run `webpush-relay generate-keys` to create a VAPID keypair)")]
    Missing(&'static str),
    /// The VAPID keypair is malformed or inconsistent.
    #[error("invalid VAPID keypair: {0:#}")]
    InvalidKey(anyhow::Error),
    /// A variable holds a value of the wrong shape.
    #[error("invalid {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// The `.env` file exists but could not be read or parsed.
    #[error("failed to load {}: {source}", path.display())]
    Dotenv {
        /// The file that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: dotenvy::Error,
    },
}

/// Copy variables from the `.env` file at `path` into the process environment.
///
/// Variables already set are not overridden. Returns `false` when the file
/// does not exist.
pub fn load_dotenv(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(source) => Err(ConfigError::Dotenv {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Runtime configuration for the relay.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signing keypair.
    pub vapid: VapidKeys,
    /// Contact URI sent as the VAPID `sub` claim.
    pub vapid_subject: String,
    /// Listen address.
    pub bind_addr: IpAddr,
    /// Listen port.
    pub port: u16,
    /// Persisted subscription file.
    pub subscriptions_file: PathBuf,
    /// TTL hint in seconds for every delivery.
    pub push_ttl: u32,
    /// Directory served under `/static` (and `/` → `index.html`).
    pub static_dir: PathBuf,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let public_key = get("VAPID_PUBLIC_KEY").ok_or(ConfigError::Missing("VAPID_PUBLIC_KEY"))?;
        let private_key =
            get("VAPID_PRIVATE_KEY").ok_or(ConfigError::Missing("VAPID_PRIVATE_KEY"))?;
        let vapid =
            VapidKeys::from_base64url(&public_key, &private_key).map_err(ConfigError::InvalidKey)?;

        let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
        let bind_addr = parse_or(get("BIND_ADDR"), "BIND_ADDR", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let push_ttl = parse_or(get("PUSH_TTL"), "PUSH_TTL", DEFAULT_PUSH_TTL)?;

        Ok(Self {
            vapid,
            vapid_subject: get("VAPID_SUBJECT")
                .unwrap_or_else(|| "mailto:admin@example.com".to_string()),
            bind_addr,
            port,
            subscriptions_file: get("SUBSCRIPTIONS_FILE")
                .map_or_else(|| PathBuf::from("data/subscriptions.json"), PathBuf::from),
            push_ttl,
            static_dir: get("STATIC_DIR").map_or_else(|| PathBuf::from("./static"), PathBuf::from),
        })
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_with(keys: &VapidKeys, extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut env = HashMap::from([
            ("VAPID_PUBLIC_KEY".to_string(), keys.public_key_base64url().to_string()),
            ("VAPID_PRIVATE_KEY".to_string(), keys.private_key_base64url().to_string()),
        ]);
        for (k, v) in extra {
            env.insert((*k).to_string(), (*v).to_string());
        }
        env
    }

    fn load(env: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let keys = VapidKeys::generate();
        let config = load(&env_with(&keys, &[])).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.push_ttl, 30);
        assert_eq!(config.subscriptions_file, PathBuf::from("data/subscriptions.json"));
        assert_eq!(config.vapid_subject, "mailto:admin@example.com");
        assert_eq!(config.vapid, keys);
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_keys_are_fatal() {
        let err = load(&HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("VAPID_PUBLIC_KEY")));

        let keys = VapidKeys::generate();
        let mut env = env_with(&keys, &[]);
        env.insert("VAPID_PRIVATE_KEY".to_string(), "   ".to_string());
        assert!(matches!(load(&env).unwrap_err(), ConfigError::Missing("VAPID_PRIVATE_KEY")));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let keys = VapidKeys::generate();
        let env = env_with(&keys, &[("VAPID_PRIVATE_KEY", "short")]);
        assert!(matches!(load(&env).unwrap_err(), ConfigError::InvalidKey(_)));
    }

    #[test]
    fn test_overrides() {
        let keys = VapidKeys::generate();
        let env = env_with(
            &keys,
            &[
                ("PORT", "9090"),
                ("BIND_ADDR", "127.0.0.1"),
                ("SUBSCRIPTIONS_FILE", "/var/lib/relay/subs.json"),
                ("PUSH_TTL", "3600"),
                ("VAPID_SUBJECT", "https://example.com"),
            ],
        );
        let config = load(&env).unwrap();
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(config.push_ttl, 3600);
        assert_eq!(config.vapid_subject, "https://example.com");
        assert_eq!(config.subscriptions_file, PathBuf::from("/var/lib/relay/subs.json"));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let keys = VapidKeys::generate();
        let env = env_with(&keys, &[("PORT", "eighty")]);
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { name: "PORT", .. }
        ));
    }

    #[test]
    fn test_dotenv_missing_file_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!load_dotenv(&dir.path().join(".env")).unwrap());
    }

    #[test]
    fn test_dotenv_seeds_environment_without_overriding() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "WEBPUSH_RELAY_DOTENV_FRESH=from-file\nWEBPUSH_RELAY_DOTENV_PRESET=from-file\n",
        )
        .unwrap();
        std::env::set_var("WEBPUSH_RELAY_DOTENV_PRESET", "from-env");

        assert!(load_dotenv(&path).unwrap());
        assert_eq!(std::env::var("WEBPUSH_RELAY_DOTENV_FRESH").unwrap(), "from-file");
        assert_eq!(std::env::var("WEBPUSH_RELAY_DOTENV_PRESET").unwrap(), "from-env");
    }

    #[test]
    fn test_dotenv_unparsable_file_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "this line has no assignment\n").unwrap();
        assert!(matches!(
            load_dotenv(&path).unwrap_err(),
            ConfigError::Dotenv { .. }
        ));
    }
}
