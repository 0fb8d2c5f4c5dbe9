//! Node configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use smpc_crypto::blake3::{contexts, derive_key};
use smpc_crypto::x25519::{X25519StaticSecret, KEY_LEN};

/// Environment variable naming the config file when no argument is given.
pub const CONFIG_ENV: &str = "SMPC_CONFIG";

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Listening socket.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Key share location.
    #[serde(default)]
    pub share: ShareConfig,
    /// Static key and published info.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Bounded waits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Log filter.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listening socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Interface to bind; also the address published in the info file.
    #[serde(default = "default_addr")]
    pub addr: String,
    /// 0 = OS-assigned ephemeral port.
    #[serde(default)]
    pub port: u16,
}

/// Key share configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    /// JSON share record `{k, n, x, y}`.
    #[serde(default = "default_share_path")]
    pub path: PathBuf,
}

/// Identity configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Hex-encoded 32-byte seed for the static X25519 key. Unset = fresh key per start.
    #[serde(default)]
    pub static_key_file: Option<PathBuf>,
    /// Where to write `{addr, port, public_key}` once listening.
    #[serde(default)]
    pub info_file: Option<PathBuf>,
}

/// Timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Dialing a peer and completing the handshake plus bootstrap.
    #[serde(default = "default_handshake_secs")]
    pub handshake_secs: u64,
    /// Waiting for the mesh to complete.
    #[serde(default = "default_formation_secs")]
    pub formation_secs: u64,
    /// The signing protocol itself.
    #[serde(default = "default_session_secs")]
    pub session_secs: u64,
    /// The closing `done` exchange.
    #[serde(default = "default_drain_secs")]
    pub drain_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive: "debug" | "info" | "warn" | "error", or a full `EnvFilter` string.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_addr() -> String {
    smpc_types::roster::DEFAULT_HOST.to_string()
}

fn default_share_path() -> PathBuf {
    PathBuf::from("share.json")
}

fn default_handshake_secs() -> u64 {
    10
}

fn default_formation_secs() -> u64 {
    30
}

fn default_session_secs() -> u64 {
    120
}

fn default_drain_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: 0,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            path: default_share_path(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_secs: default_handshake_secs(),
            formation_secs: default_formation_secs(),
            session_secs: default_session_secs(),
            drain_secs: default_drain_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TimeoutConfig {
    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    pub fn formation(&self) -> Duration {
        Duration::from_secs(self.formation_secs)
    }

    pub fn session(&self) -> Duration {
        Duration::from_secs(self.session_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }
}

impl IdentityConfig {
    /// The node's static key: derived from the configured seed, or fresh.
    pub fn static_key(&self) -> anyhow::Result<X25519StaticSecret> {
        let Some(path) = &self.static_key_file else {
            return Ok(X25519StaticSecret::random());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading static key file {}", path.display()))?;
        let seed = hex::decode(content.trim())
            .with_context(|| format!("static key file {} is not hex", path.display()))?;
        if seed.len() != KEY_LEN {
            anyhow::bail!(
                "static key file {} holds {} bytes, expected {KEY_LEN}",
                path.display(),
                seed.len()
            );
        }
        Ok(X25519StaticSecret::from_bytes(derive_key(
            contexts::NODE_STATIC_KEY,
            &seed,
        )))
    }
}

impl NodeConfig {
    /// Load from `path`, else from `$SMPC_CONFIG`, else defaults.
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a TOML file. A named file that does not exist is an error.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: NodeConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "smpc-node-{}-{name}",
            hex::encode(rand::random::<[u8; 8]>())
        ));
        std::fs::write(&path, content).expect("write");
        path
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.listen.addr, "127.0.0.1");
        assert_eq!(config.listen.port, 0);
        assert_eq!(config.share.path, PathBuf::from("share.json"));
        assert!(config.identity.static_key_file.is_none());
        assert_eq!(config.timeouts.formation(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = NodeConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: NodeConfig = toml::from_str(&toml_str).expect("parse");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            [listen]
            port = 4000

            [timeouts]
            session_secs = 5
            "#,
        )
        .expect("parse");
        assert_eq!(config.listen.port, 4000);
        assert_eq!(config.listen.addr, "127.0.0.1");
        assert_eq!(config.timeouts.session_secs, 5);
        assert_eq!(config.timeouts.drain_secs, 10);
    }

    #[test]
    fn test_load_from_file() {
        let path = scratch_file("config.toml", "[share]\npath = \"/var/lib/smpc/share.json\"\n");
        let config = NodeConfig::load(Some(path.clone())).expect("load");
        assert_eq!(config.share.path, PathBuf::from("/var/lib/smpc/share.json"));
        std::fs::remove_file(path).expect("cleanup");

        assert!(NodeConfig::from_file(Path::new("/nonexistent/smpc.toml")).is_err());
    }

    #[test]
    fn test_static_key_from_seed_is_stable() {
        let path = scratch_file("key.hex", &format!("{}\n", "ab".repeat(32)));
        let identity = IdentityConfig {
            static_key_file: Some(path.clone()),
            info_file: None,
        };
        let first = identity.static_key().expect("key");
        let second = identity.static_key().expect("key");
        assert_eq!(first.public_key(), second.public_key());
        std::fs::remove_file(path).expect("cleanup");

        let short = scratch_file("short.hex", "abcd");
        let identity = IdentityConfig {
            static_key_file: Some(short.clone()),
            info_file: None,
        };
        assert!(identity.static_key().is_err());
        std::fs::remove_file(short).expect("cleanup");
    }

    #[test]
    fn test_random_static_key_without_file() {
        let identity = IdentityConfig::default();
        let a = identity.static_key().expect("key");
        let b = identity.static_key().expect("key");
        assert_ne!(a.public_key(), b.public_key());
    }
}
