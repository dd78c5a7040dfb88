//! Generic search executor
//!
//! [`SearchClient`] runs the conversation between a retrieval policy, a
//! processing policy and the transport: build controls, issue the request,
//! hand the page over, ask whether another page is needed — reconnecting and
//! reissuing the whole exchange on transient failures, within a bounded
//! retry budget. Any combination of policies runs through the same loop.

use ldap3::SearchEntry;
use tracing::{debug, instrument, warn};

use crate::config::DirectoryConfig;
use crate::error::{SearchError, SearchResult};
use crate::process::ProcessingPolicy;
use crate::retrieval::{RetrievalPolicy, VlvSnapshot};
use crate::transport::{DirectoryTransport, LdapTransport, SearchRequest};

/// Additional reconnect-and-reissue attempts after the first failure.
pub const DEFAULT_SEARCH_RETRIES: u32 = 2;

/// Result of a VLV search: the window's entries plus the server's view of
/// the window position.
#[derive(Debug)]
pub struct VlvPage {
    pub entries: Vec<SearchEntry>,
    pub snapshot: VlvSnapshot,
}

/// Directory search client: owns one transport connection and executes
/// policy-driven searches over it.
#[derive(Debug)]
pub struct SearchClient<T = LdapTransport> {
    transport: T,
}

impl SearchClient<LdapTransport> {
    /// Create a client over an `ldap3` transport for the given config.
    /// Connects lazily on the first search.
    pub fn from_config(config: DirectoryConfig) -> SearchResult<Self> {
        Ok(Self::new(LdapTransport::new(config)?))
    }
}

impl<T: DirectoryTransport> SearchClient<T> {
    /// Create a client over an existing transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Get the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the client and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Execute a search with explicit retrieval and processing policies and
    /// a retry budget of `retries` additional attempts.
    ///
    /// On success the outcome lives in the policies: accumulated entries in
    /// the processing policy, window position in a VLV retrieval policy.
    /// On failure the caller gets a single terminal error; accumulated state
    /// from failed attempts never leaks into the result.
    #[instrument(
        skip(self, request, retrieval, processing),
        fields(
            base = %request.base,
            filter = %request.filter,
            retrieval = retrieval.name(),
            processing = processing.name(),
        )
    )]
    pub async fn search(
        &mut self,
        request: &SearchRequest,
        retrieval: &mut RetrievalPolicy,
        processing: &mut ProcessingPolicy,
        retries: u32,
    ) -> SearchResult<()> {
        let mut attempts_left = retries;

        loop {
            match self.run_attempt(request, retrieval, processing).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempts_left > 0 => {
                    attempts_left -= 1;
                    warn!(
                        error = %err,
                        attempts_left,
                        "search attempt failed, reconnecting"
                    );

                    // A failed attempt must leave no trace: partial pages
                    // are dropped and continuation state goes back to
                    // initial before the exchange is reissued.
                    processing.reset();
                    retrieval.prepare_retry();
                    self.transport.reconnect().await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One full multi-page exchange.
    async fn run_attempt(
        &mut self,
        request: &SearchRequest,
        retrieval: &mut RetrievalPolicy,
        processing: &mut ProcessingPolicy,
    ) -> SearchResult<()> {
        loop {
            let controls = retrieval.build_controls()?;
            let page = self.transport.search(request, controls).await?;

            let received = page.entries.len();
            processing.process(page.entries)?;

            // Continuation, not retry: state carries over to the next page.
            let more = retrieval.advance(&page.controls)?;
            debug!(entries = received, more, "processed search page");

            if !more {
                return Ok(());
            }
        }
    }

    /// Plain search: single request, all entries accumulated, default retry.
    pub async fn search_simple(
        &mut self,
        request: &SearchRequest,
    ) -> SearchResult<Vec<SearchEntry>> {
        let mut retrieval = RetrievalPolicy::simple();
        let mut processing = ProcessingPolicy::accumulate();

        self.search(request, &mut retrieval, &mut processing, DEFAULT_SEARCH_RETRIES)
            .await?;

        Ok(processing.take_entries())
    }

    /// Paged search: all pages accumulated, default retry.
    pub async fn search_paged(
        &mut self,
        request: &SearchRequest,
        page_size: i32,
    ) -> SearchResult<Vec<SearchEntry>> {
        let mut retrieval = RetrievalPolicy::paged(page_size)?;
        let mut processing = ProcessingPolicy::accumulate();

        self.search(request, &mut retrieval, &mut processing, DEFAULT_SEARCH_RETRIES)
            .await?;

        Ok(processing.take_entries())
    }

    /// Paged search streaming every entry through `callback`, default retry.
    pub async fn search_each(
        &mut self,
        request: &SearchRequest,
        page_size: i32,
        callback: impl FnMut(SearchEntry) -> SearchResult<()> + Send + 'static,
    ) -> SearchResult<()> {
        let mut retrieval = RetrievalPolicy::paged(page_size)?;
        let mut processing = ProcessingPolicy::callback(callback);

        self.search(request, &mut retrieval, &mut processing, DEFAULT_SEARCH_RETRIES)
            .await
    }

    /// VLV search: one window of `count` entries starting at 1-based offset
    /// `from` in the list sorted by `sort_attr`, default retry.
    ///
    /// The returned snapshot carries the server-side result code; a window
    /// the server disliked still comes back as a successful search.
    pub async fn search_vlv(
        &mut self,
        request: &SearchRequest,
        sort_attr: &str,
        from: u32,
        count: u32,
    ) -> SearchResult<VlvPage> {
        let mut retrieval = RetrievalPolicy::vlv(sort_attr, from, count, 0, Vec::new())?;
        let mut processing = ProcessingPolicy::accumulate();

        self.search(request, &mut retrieval, &mut processing, DEFAULT_SEARCH_RETRIES)
            .await?;

        let snapshot = retrieval
            .vlv_snapshot()
            .ok_or_else(|| SearchError::internal("vlv snapshot missing"))?;

        Ok(VlvPage {
            entries: processing.take_entries(),
            snapshot,
        })
    }
}
