//! Directory transport
//!
//! The search executor talks to the directory through the
//! [`DirectoryTransport`] trait: issue one request with a set of controls,
//! get one page of entries and response controls back, reconnect on demand.
//! [`LdapTransport`] is the production implementation on top of `ldap3`;
//! tests substitute scripted implementations.

use async_trait::async_trait;
use ldap3::controls::{Control, RawControl};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, instrument, warn};

use crate::config::DirectoryConfig;
use crate::error::{SearchError, SearchResult};

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// One directory search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Search base DN.
    pub base: String,
    /// Search scope; defaults to subtree.
    pub scope: Scope,
    /// LDAP filter expression.
    pub filter: String,
    /// Attributes to return; empty means all user attributes.
    pub attrs: Vec<String>,
}

impl SearchRequest {
    /// Create a subtree request for the given base and filter.
    pub fn new(base: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            scope: Scope::Subtree,
            filter: filter.into(),
            attrs: Vec::new(),
        }
    }

    /// Set the search scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the attributes to return.
    #[must_use]
    pub fn with_attrs(mut self, attrs: &[&str]) -> Self {
        self.attrs = attrs.iter().map(|a| (*a).to_string()).collect();
        self
    }
}

/// One page of results: the entries of a single protocol round-trip plus the
/// response controls that came with them.
#[derive(Debug)]
pub struct SearchPage {
    pub entries: Vec<SearchEntry>,
    pub controls: Vec<Control>,
}

/// Black-box protocol transport used by the search executor.
#[async_trait]
pub trait DirectoryTransport: Send {
    /// Tear down the current connection and establish a fresh one.
    async fn reconnect(&mut self) -> SearchResult<()>;

    /// Issue one search request and receive one page.
    ///
    /// A non-zero operation result code is an error here; server verdicts
    /// embedded in response controls are not judged at this layer.
    async fn search(
        &mut self,
        request: &SearchRequest,
        controls: Vec<RawControl>,
    ) -> SearchResult<SearchPage>;
}

/// `ldap3`-backed transport. Connects lazily on first use.
pub struct LdapTransport {
    config: DirectoryConfig,
    ldap: Option<Ldap>,
}

impl LdapTransport {
    /// Create a transport for the given configuration.
    pub fn new(config: DirectoryConfig) -> SearchResult<Self> {
        config.validate()?;
        Ok(Self { config, ldap: None })
    }

    /// Establish a connection and bind.
    async fn connect(&self) -> SearchResult<Ldap> {
        let url = self.config.url();

        debug!(url = %url, "connecting to directory server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(std::time::Duration::from_secs(
                self.config.connect_timeout_secs,
            ))
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                SearchError::connection_failed_with_source(
                    format!("failed to connect to {}", url),
                    e,
                )
            })?;

        // Drive the connection until it is closed.
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "ldap connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "performing simple bind");

        let result = ldap.simple_bind(bind_dn, bind_password).await.map_err(|e| {
            SearchError::connection_failed_with_source(format!("bind failed for {}", bind_dn), e)
        })?;

        if result.rc == RC_INVALID_CREDENTIALS {
            return Err(SearchError::AuthenticationFailed);
        }
        if result.rc != 0 {
            return Err(SearchError::connection_failed(format!(
                "bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(host = %self.config.host, "directory connection established");

        Ok(ldap)
    }

    async fn handle(&mut self) -> SearchResult<&mut Ldap> {
        if self.ldap.is_none() {
            let ldap = self.connect().await?;
            self.ldap = Some(ldap);
        }
        match self.ldap.as_mut() {
            Some(ldap) => Ok(ldap),
            None => Err(SearchError::internal("connection missing after connect")),
        }
    }

    /// Unbind and drop the connection.
    pub async fn close(&mut self) {
        if let Some(mut ldap) = self.ldap.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "error during unbind");
            }
        }
    }
}

#[async_trait]
impl DirectoryTransport for LdapTransport {
    #[instrument(skip(self))]
    async fn reconnect(&mut self) -> SearchResult<()> {
        // Old connection goes away before the replacement is attempted.
        self.close().await;

        let ldap = self.connect().await?;
        self.ldap = Some(ldap);
        Ok(())
    }

    #[instrument(
        skip(self, request, controls),
        fields(base = %request.base, filter = %request.filter)
    )]
    async fn search(
        &mut self,
        request: &SearchRequest,
        controls: Vec<RawControl>,
    ) -> SearchResult<SearchPage> {
        let attrs = if request.attrs.is_empty() {
            vec!["*".to_string()]
        } else {
            request.attrs.clone()
        };

        let ldap = self.handle().await?;

        let result = ldap
            .with_controls(controls)
            .search(&request.base, request.scope, &request.filter, attrs)
            .await
            .map_err(|e| SearchError::transport_with_source("search request failed", e))?;

        let ldap3::SearchResult(entries, res) = result;

        if res.rc != 0 {
            return Err(SearchError::Directory {
                rc: res.rc,
                text: res.text,
            });
        }

        let entries: Vec<SearchEntry> = entries.into_iter().map(SearchEntry::construct).collect();

        debug!(entries = entries.len(), "received search page");

        Ok(SearchPage {
            entries,
            controls: res.ctrls,
        })
    }
}

impl std::fmt::Debug for LdapTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapTransport")
            .field("config", &self.config)
            .field("connected", &self.ldap.is_some())
            .finish()
    }
}
