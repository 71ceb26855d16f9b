//! Configuration for TinySQL
//!
//! Centralized server and client configuration with sensible defaults.

use crate::error::{Result, TinySqlError};
use crate::protocol::{HEADER_SIZE, MAX_FRAME_SIZE};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Disable Nagle's algorithm on accepted sockets
    pub nodelay: bool,

    /// Max concurrent client connections (0 = unlimited)
    pub max_connections: usize,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Largest frame accepted from a peer, header included (in bytes)
    pub max_frame_size: u32,

    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Database attached to every new session
    pub default_database: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".to_string(),
            nodelay: true,
            max_connections: 0,
            max_frame_size: MAX_FRAME_SIZE,
            default_database: "test".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Enable or disable TCP_NODELAY on accepted sockets
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the maximum frame size (in bytes)
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the default database name
    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        self.config.default_database = name.into();
        self
    }

    pub fn build(self) -> Result<ServerConfig> {
        validate_frame_size(self.config.max_frame_size)?;
        Ok(self.config)
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub server_addr: String,

    /// User identity sent in the Startup message
    pub user: String,

    /// Largest frame accepted from the server (in bytes)
    pub max_frame_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:4000".to_string(),
            user: "root".to_string(),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the server address
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Set the user to connect as
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    /// Set the maximum frame size (in bytes)
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.config.max_frame_size = size;
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        validate_frame_size(self.config.max_frame_size)?;
        Ok(self.config)
    }
}

fn validate_frame_size(size: u32) -> Result<()> {
    if (size as usize) < HEADER_SIZE {
        return Err(TinySqlError::Config(format!(
            "max_frame_size must be at least {} bytes, got {}",
            HEADER_SIZE, size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::builder().build().unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:4000");
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.max_frame_size, MAX_FRAME_SIZE);
        assert_eq!(config.default_database, "test");
    }

    #[test]
    fn test_client_builder_overrides() {
        let config = ClientConfig::builder()
            .server_addr("10.0.0.1:5000")
            .user("alice")
            .build()
            .unwrap();
        assert_eq!(config.server_addr, "10.0.0.1:5000");
        assert_eq!(config.user, "alice");
    }

    #[test]
    fn test_frame_size_below_header_rejected() {
        let err = ServerConfig::builder().max_frame_size(4).build().unwrap_err();
        assert!(matches!(err, TinySqlError::Config(_)));
        assert!(ClientConfig::builder().max_frame_size(5).build().is_ok());
    }
}
