use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

/// Static username/password table (RFC 1929). Mutation (a "management
/// collaborator" concern) and hot reload are out of scope (spec.md §1, §5) —
/// this is the cold-start, load-once representation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserTable {
    #[serde(default)]
    users: Vec<Credential>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl UserTable {
    pub fn new(users: Vec<(String, String)>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|(username, password)| Credential { username, password })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Linear scan for an exact `(username, password)` match, per spec.md
    /// §4.6 AUTH_READ.
    pub fn check(&self, username: &[u8], password: &[u8]) -> bool {
        self.users
            .iter()
            .any(|c| c.username.as_bytes() == username && c.password.as_bytes() == password)
    }
}

/// Server-wide configuration, loadable from a TOML file (`ServerConfig::load`)
/// or built programmatically (`ServerConfig::new`/`ServerConfig::default`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub backlog: u32,
    /// Cap on the reusable connection-state free list (spec.md §3 Connection
    /// pool).
    pub pool_capacity: usize,
    /// Size, in bytes, of each of the two per-connection buffers (spec.md §3:
    /// "each ~4 KiB").
    pub buffer_size: usize,
    pub no_auth_required: bool,
    #[serde(default)]
    pub users: UserTable,
    /// Directory or file prefix to roll daily log files into, in addition to
    /// stdout. `None` keeps logging to stdout only (ambient stack, SPEC_FULL
    /// §3: "tracing-appender for optional file logging").
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 1080).into(),
            backlog: 512,
            pool_capacity: 50,
            buffer_size: 4096,
            no_auth_required: true,
            users: UserTable::default(),
            log_file: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requires_password_auth(&self) -> bool {
        !self.no_auth_required
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_check_is_exact_match() {
        let table = UserTable::new(vec![("alice".into(), "s3cret".into())]);
        assert!(table.check(b"alice", b"s3cret"));
        assert!(!table.check(b"alice", b"wrong"));
        assert!(!table.check(b"bob", b"s3cret"));
    }

    #[test]
    fn default_config_has_no_credentials() {
        let config = ServerConfig::default();
        assert!(!config.requires_password_auth());
        assert!(config.no_auth_required);
    }

    #[test]
    fn loads_from_toml() {
        let toml_text = r#"
            listen_addr = "127.0.0.1:1080"
            backlog = 128
            pool_capacity = 10
            buffer_size = 2048
            no_auth_required = false

            [users]
            users = [{ username = "alice", password = "s3cret" }]
        "#;
        let config: ServerConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:1080".parse().unwrap());
        assert!(config.requires_password_auth());
        assert!(config.users.check(b"alice", b"s3cret"));
    }
}
