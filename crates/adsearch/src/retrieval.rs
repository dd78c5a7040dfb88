//! Retrieval policies
//!
//! A retrieval policy decides which protocol controls accompany each request
//! of a multi-page search and whether the server's response asks for another
//! page. Three policies exist:
//!
//! - [`RetrievalPolicy::Simple`] — one request, no continuation controls.
//! - [`RetrievalPolicy::Paged`] — RFC 2696 cookie-based continuation.
//! - [`RetrievalPolicy::Vlv`] — server-side sort plus a Virtual List View
//!   window; one request per window, never a continuation.
//!
//! Each variant owns its private state, so a policy can never be separated
//! from the continuation data it depends on.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ldap3::controls::{Control, RawControl};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controls::{
    domain_scope_control, find_paged_response, find_vlv_response, paged_control, parse_paged_value,
    sort_control, VlvRequest, VlvResponse,
};
use crate::error::{SearchError, SearchResult};

/// Retrieval policy for a directory search.
#[derive(Debug, Clone)]
pub enum RetrievalPolicy {
    /// Plain single-request search.
    Simple,
    /// Cookie-based paged retrieval.
    Paged(PagedState),
    /// Sorted, windowed retrieval.
    Vlv(VlvState),
}

/// Private state of the paged retrieval policy.
#[derive(Debug, Clone)]
pub struct PagedState {
    page_size: i32,
    cookie: Vec<u8>,
}

/// Private state of the VLV retrieval policy.
#[derive(Debug, Clone)]
pub struct VlvState {
    sort_attr: String,
    from: u32,
    count: u32,
    table_size: u32,
    context: Vec<u8>,
    result_code: u32,
}

impl RetrievalPolicy {
    /// Create the simple single-request policy.
    pub fn simple() -> Self {
        RetrievalPolicy::Simple
    }

    /// Create a paged retrieval policy.
    pub fn paged(page_size: i32) -> SearchResult<Self> {
        if page_size <= 0 {
            return Err(SearchError::invalid_parameter("page_size must be positive"));
        }

        Ok(RetrievalPolicy::Paged(PagedState {
            page_size,
            cookie: Vec::new(),
        }))
    }

    /// Create a VLV retrieval policy for a window of `count` entries
    /// starting at 1-based offset `from` in the list sorted by `sort_attr`.
    ///
    /// `table_size` and `context` resume a previous window (pass 0 and an
    /// empty blob on first use).
    pub fn vlv(
        sort_attr: impl Into<String>,
        from: u32,
        count: u32,
        table_size: u32,
        context: Vec<u8>,
    ) -> SearchResult<Self> {
        if count == 0 {
            return Err(SearchError::invalid_parameter("count must be positive"));
        }
        if from == 0 {
            return Err(SearchError::invalid_parameter(
                "from must be positive - this API is 1-based",
            ));
        }

        Ok(RetrievalPolicy::Vlv(VlvState {
            sort_attr: sort_attr.into(),
            from,
            count,
            table_size,
            context,
            result_code: 0,
        }))
    }

    /// Policy name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RetrievalPolicy::Simple => "simple",
            RetrievalPolicy::Paged(_) => "paged",
            RetrievalPolicy::Vlv(_) => "vlv",
        }
    }

    /// Build the request controls for the next page.
    pub fn build_controls(&mut self) -> SearchResult<Vec<RawControl>> {
        match self {
            RetrievalPolicy::Simple => Ok(Vec::new()),
            RetrievalPolicy::Paged(state) => Ok(vec![
                domain_scope_control(),
                paged_control(state.page_size, state.cookie.clone()),
            ]),
            RetrievalPolicy::Vlv(state) => {
                let controls = vec![
                    domain_scope_control(),
                    sort_control(&state.sort_attr)?,
                    state.request().to_control()?,
                ];
                // A fresh request invalidates any previously stored verdict.
                state.result_code = 0;
                Ok(controls)
            }
        }
    }

    /// Digest the response controls of a page; returns whether another page
    /// should be requested.
    pub fn advance(&mut self, controls: &[Control]) -> SearchResult<bool> {
        match self {
            RetrievalPolicy::Simple => Ok(false),
            RetrievalPolicy::Paged(state) => {
                let raw = find_paged_response(controls).ok_or_else(|| {
                    SearchError::protocol_parse("paged results response control missing")
                })?;
                let (estimate, cookie) = parse_paged_value(raw.val.as_deref().unwrap_or_default())?;

                debug!(
                    estimate,
                    cookie_len = cookie.len(),
                    "parsed paged results response"
                );

                state.cookie = cookie;
                Ok(!state.cookie.is_empty())
            }
            RetrievalPolicy::Vlv(state) => {
                let raw = find_vlv_response(controls).ok_or_else(|| {
                    SearchError::protocol_parse_recoverable("no vlv response control in response")
                })?;
                let resp = VlvResponse::parse(raw.val.as_deref().unwrap_or_default())?;

                state.context = resp.context;
                state.from = resp.target_position;
                state.table_size = resp.content_count;
                state.result_code = resp.result_code;

                if state.result_code != 0 {
                    debug!(
                        result_code = state.result_code,
                        "server vlv query reported an error code"
                    );
                }

                // One window per request: a parseable response always ends
                // retrieval, whatever verdict it carries.
                Ok(false)
            }
        }
    }

    /// Reset continuation state before a retry attempt.
    ///
    /// A reconnected server session cannot validate cookies or context blobs
    /// issued by the previous one.
    pub fn prepare_retry(&mut self) {
        match self {
            RetrievalPolicy::Simple => {}
            RetrievalPolicy::Paged(state) => state.cookie.clear(),
            RetrievalPolicy::Vlv(state) => {
                state.context.clear();
                state.result_code = 0;
            }
        }
    }

    /// Read the VLV window position after a search completes.
    ///
    /// `None` for non-VLV policies.
    pub fn vlv_snapshot(&self) -> Option<VlvSnapshot> {
        match self {
            RetrievalPolicy::Vlv(state) => Some(VlvSnapshot {
                context: state.context.clone(),
                from: state.from,
                table_size: state.table_size,
                result_code: state.result_code,
            }),
            _ => None,
        }
    }
}

impl VlvState {
    fn request(&self) -> VlvRequest {
        VlvRequest {
            before_count: 0,
            after_count: self.count - 1,
            offset: self.from,
            // No table size estimate exists before the first response, so
            // bootstrap with the window length.
            content_count: if self.from > 1 {
                self.table_size
            } else {
                self.count
            },
            context: self.context.clone(),
        }
    }
}

/// The server's view of a VLV window after a completed search: context blob
/// for the next window, adjusted offset, list size estimate and the
/// server-side result code.
///
/// The result code is deliberately not an error: a search that parsed is a
/// successful search, and the verdict on the window parameters is read from
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlvSnapshot {
    /// Opaque server context, echoed into the next window request.
    pub context: Vec<u8>,
    /// Server-adjusted 1-based offset of the window start.
    pub from: u32,
    /// Server's estimate of the sorted list size.
    pub table_size: u32,
    /// Server-side VLV result code (0 on success).
    pub result_code: u32,
}

/// Storable form of a [`VlvSnapshot`].
#[derive(Serialize, Deserialize)]
struct VlvToken {
    context: String,
    from: u32,
    table_size: u32,
    result_code: u32,
}

impl VlvSnapshot {
    /// Serialize for storage, e.g. to resume a window scan in a later run.
    pub fn to_token(&self) -> String {
        let token = VlvToken {
            context: BASE64.encode(&self.context),
            from: self.from,
            table_size: self.table_size,
            result_code: self.result_code,
        };
        serde_json::to_string(&token).unwrap_or_default()
    }

    /// Parse from a stored token.
    pub fn from_token(token: &str) -> Option<Self> {
        let token: VlvToken = serde_json::from_str(token).ok()?;
        let context = BASE64.decode(token.context).ok()?;
        Some(VlvSnapshot {
            context,
            from: token.from,
            table_size: token.table_size,
            result_code: token.result_code,
        })
    }
}
