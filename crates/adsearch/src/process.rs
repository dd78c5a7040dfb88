//! Processing policies
//!
//! A processing policy decides what happens to each page of entries the
//! transport hands over:
//!
//! - [`ProcessingPolicy::Accumulate`] merges all pages into one result set,
//!   in arrival order, and exposes it when the search completes.
//! - [`ProcessingPolicy::Callback`] streams every entry of a page through a
//!   caller-supplied function and releases the page.
//!
//! Processing never halts retrieval; stopping is the retrieval policy's
//! decision. A processing failure, on the other hand, aborts the whole
//! search: a partially merged result set cannot be safely resumed.

use ldap3::SearchEntry;

use crate::error::{SearchError, SearchResult};

/// Per-entry callback. The closure owns whatever caller context it captured.
pub type EntryCallback = Box<dyn FnMut(SearchEntry) -> SearchResult<()> + Send>;

/// Processing policy for a directory search.
pub enum ProcessingPolicy {
    /// Merge all pages into one in-memory result set.
    Accumulate { entries: Vec<SearchEntry> },
    /// Invoke a caller function per entry, retaining nothing.
    Callback { callback: EntryCallback },
}

impl ProcessingPolicy {
    /// Create an accumulating policy with an empty result set.
    pub fn accumulate() -> Self {
        ProcessingPolicy::Accumulate {
            entries: Vec::new(),
        }
    }

    /// Create a streaming policy around a per-entry callback.
    ///
    /// The callback runs synchronously inside the page-received step and
    /// must not re-enter the search client it is serving.
    pub fn callback(
        callback: impl FnMut(SearchEntry) -> SearchResult<()> + Send + 'static,
    ) -> Self {
        ProcessingPolicy::Callback {
            callback: Box::new(callback),
        }
    }

    /// Policy name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingPolicy::Accumulate { .. } => "accumulate",
            ProcessingPolicy::Callback { .. } => "callback",
        }
    }

    /// Process one page of entries.
    pub fn process(&mut self, page: Vec<SearchEntry>) -> SearchResult<()> {
        match self {
            ProcessingPolicy::Accumulate { entries } => {
                if entries.is_empty() {
                    *entries = page;
                } else {
                    entries.extend(page);
                }
                Ok(())
            }
            ProcessingPolicy::Callback { callback } => {
                for entry in page {
                    match callback(entry) {
                        Ok(()) => {}
                        Err(err @ SearchError::Processing { .. }) => return Err(err),
                        Err(err) => {
                            return Err(SearchError::processing_with_source(
                                "entry callback failed",
                                err,
                            ))
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Discard state from a failed attempt.
    ///
    /// Called before every retry so a partial merge never leaks into the
    /// next attempt. The callback policy holds no state to discard.
    pub fn reset(&mut self) {
        if let ProcessingPolicy::Accumulate { entries } = self {
            entries.clear();
        }
    }

    /// Take the accumulated result set. Empty for the callback policy.
    pub fn take_entries(&mut self) -> Vec<SearchEntry> {
        match self {
            ProcessingPolicy::Accumulate { entries } => std::mem::take(entries),
            ProcessingPolicy::Callback { .. } => Vec::new(),
        }
    }
}

impl std::fmt::Debug for ProcessingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingPolicy::Accumulate { entries } => f
                .debug_struct("Accumulate")
                .field("entries", &entries.len())
                .finish(),
            ProcessingPolicy::Callback { .. } => f.debug_struct("Callback").finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn entry(dn: &str) -> SearchEntry {
        SearchEntry {
            dn: dn.to_string(),
            attrs: Default::default(),
            bin_attrs: Default::default(),
        }
    }

    fn page(dns: &[&str]) -> Vec<SearchEntry> {
        dns.iter().map(|dn| entry(dn)).collect()
    }

    #[test]
    fn test_accumulate_merges_in_arrival_order() {
        let mut policy = ProcessingPolicy::accumulate();

        policy.process(page(&["cn=a", "cn=b"])).unwrap();
        policy.process(page(&["cn=c"])).unwrap();

        let dns: Vec<String> = policy.take_entries().into_iter().map(|e| e.dn).collect();
        assert_eq!(dns, vec!["cn=a", "cn=b", "cn=c"]);
    }

    #[test]
    fn test_accumulate_reset_discards_everything() {
        let mut policy = ProcessingPolicy::accumulate();
        policy.process(page(&["cn=a", "cn=b"])).unwrap();

        policy.reset();
        policy.process(page(&["cn=c"])).unwrap();

        let dns: Vec<String> = policy.take_entries().into_iter().map(|e| e.dn).collect();
        assert_eq!(dns, vec!["cn=c"]);
    }

    #[test]
    fn test_callback_invoked_once_per_entry_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut policy = ProcessingPolicy::callback(move |entry| {
            sink.lock().unwrap().push(entry.dn);
            Ok(())
        });

        policy
            .process(page(&["cn=1", "cn=2", "cn=3", "cn=4", "cn=5"]))
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["cn=1", "cn=2", "cn=3", "cn=4", "cn=5"]
        );
        // Nothing retained by the policy itself.
        assert!(policy.take_entries().is_empty());
    }

    #[test]
    fn test_callback_error_becomes_processing_error() {
        let mut policy = ProcessingPolicy::callback(|entry| {
            if entry.dn == "cn=2" {
                Err(SearchError::internal("caller gave up"))
            } else {
                Ok(())
            }
        });

        let err = policy.process(page(&["cn=1", "cn=2", "cn=3"])).unwrap_err();
        assert_eq!(err.error_code(), "PROCESSING_FAILED");
        assert!(err.is_permanent());
    }
}
