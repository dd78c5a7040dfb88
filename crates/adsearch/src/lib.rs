//! # adsearch
//!
//! Policy-driven LDAP/Active Directory search on top of `ldap3`.
//!
//! Directory searches come in many shapes: one query or a cookie-paged
//! sequence of queries, a sorted Virtual List View window into a huge
//! result set, results accumulated in memory or streamed entry by entry,
//! with or without reconnect-and-retry on flaky links. Instead of one
//! search function per combination, this crate factors a search into three
//! orthogonal policies and runs any mix of them through a single executor:
//!
//! - [`RetrievalPolicy`] — simple, paged (RFC 2696) or VLV retrieval
//! - [`ProcessingPolicy`] — accumulate pages or stream entries to a callback
//! - a retry budget — bounded reconnect-and-reissue on transient failures
//!
//! ## Example
//!
//! ```ignore
//! use adsearch::{DirectoryConfig, SearchClient, SearchRequest};
//!
//! let config = DirectoryConfig::new(
//!     "ldap.example.com",
//!     "dc=example,dc=com",
//!     "cn=admin,dc=example,dc=com",
//! )
//! .with_password("secret");
//!
//! let mut client = SearchClient::from_config(config)?;
//!
//! // All users, fetched page by page, merged into one result set.
//! let request = SearchRequest::new("dc=example,dc=com", "(objectClass=user)")
//!     .with_attrs(&["cn", "mail"]);
//! let entries = client.search_paged(&request, 500).await?;
//!
//! // A sorted window: entries 1..=50 by sAMAccountName.
//! let window = client.search_vlv(&request, "sAMAccountName", 1, 50).await?;
//! println!("~{} entries total", window.snapshot.table_size);
//! ```
//!
//! Custom combinations go through [`SearchClient::search`] with explicitly
//! constructed policies.

pub mod config;
pub mod controls;
pub mod entry;
pub mod error;
pub mod process;
pub mod retrieval;
pub mod search;
pub mod transport;

// Re-exports
pub use ldap3::{self, Scope, SearchEntry};

pub use config::DirectoryConfig;
pub use error::{SearchError, SearchResult};
pub use process::{EntryCallback, ProcessingPolicy};
pub use retrieval::{RetrievalPolicy, VlvSnapshot};
pub use search::{SearchClient, VlvPage, DEFAULT_SEARCH_RETRIES};
pub use transport::{DirectoryTransport, LdapTransport, SearchPage, SearchRequest};

/// Prelude module for convenient imports.
///
/// ```
/// use adsearch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::DirectoryConfig;
    pub use crate::error::{SearchError, SearchResult};
    pub use crate::process::ProcessingPolicy;
    pub use crate::retrieval::{RetrievalPolicy, VlvSnapshot};
    pub use crate::search::{SearchClient, VlvPage, DEFAULT_SEARCH_RETRIES};
    pub use crate::transport::{DirectoryTransport, SearchPage, SearchRequest};
    pub use ldap3::{Scope, SearchEntry};
}
