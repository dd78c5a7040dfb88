//! Directory connection configuration
//!
//! Configuration for connecting to an LDAP or Active Directory server.

use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};

/// Configuration for a directory server connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory server hostname or IP address.
    pub host: String,

    /// Server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on a plain connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Bind DN for authentication (e.g., "cn=admin,dc=example,dc=com").
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Default search base (e.g., "dc=example,dc=com").
    pub base_dn: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Page size used by the paged-search convenience wrappers.
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

fn default_port() -> u16 {
    389
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> i32 {
    1000
}

impl DirectoryConfig {
    /// Create a new config with required fields.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            use_ssl: false,
            use_starttls: false,
            bind_dn: bind_dn.into(),
            bind_password: None,
            base_dn: base_dn.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
            page_size: default_page_size(),
        }
    }

    /// Set the bind password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable SSL (LDAPS) and switch to the LDAPS port.
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Set the page size used by paged-search wrappers.
    #[must_use]
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Get the server URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SearchResult<()> {
        if self.host.is_empty() {
            return Err(SearchError::invalid_parameter("host is required"));
        }

        if self.bind_dn.is_empty() {
            return Err(SearchError::invalid_parameter("bind_dn is required"));
        }

        if self.base_dn.is_empty() {
            return Err(SearchError::invalid_parameter("base_dn is required"));
        }

        if self.use_ssl && self.use_starttls {
            return Err(SearchError::invalid_parameter(
                "cannot use both SSL and STARTTLS",
            ));
        }

        if self.page_size <= 0 {
            return Err(SearchError::invalid_parameter("page_size must be positive"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("base_dn", &self.base_dn)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DirectoryConfig {
        DirectoryConfig::new(
            "ldap.example.com",
            "dc=example,dc=com",
            "cn=admin,dc=example,dc=com",
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = config().with_password("secret");

        assert_eq!(config.host, "ldap.example.com");
        assert_eq!(config.port, 389);
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.bind_password, Some("secret".to_string()));
    }

    #[test]
    fn test_config_url() {
        assert_eq!(config().url(), "ldap://ldap.example.com:389");
        assert_eq!(config().with_ssl().url(), "ldaps://ldap.example.com:636");
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let empty_host = DirectoryConfig::new("", "dc=example,dc=com", "cn=admin");
        assert!(empty_host.validate().is_err());

        let mut ssl_and_starttls = config().with_ssl();
        ssl_and_starttls.use_starttls = true;
        assert!(ssl_and_starttls.validate().is_err());

        let bad_page = config().with_page_size(0);
        assert!(bad_page.validate().is_err());
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = config().with_password("super-secret");
        let debug = format!("{:?}", config);

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***REDACTED***"));
    }

    #[test]
    fn test_config_serialization() {
        let config = config().with_password("secret");

        let json = serde_json::to_string(&config).unwrap();
        let parsed: DirectoryConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.host, "ldap.example.com");
        assert_eq!(parsed.base_dn, "dc=example,dc=com");
    }
}
