//! Attribute extraction helpers
//!
//! Convenience accessors over [`SearchEntry`] for the attribute encodings
//! commonly found in LDAP and Active Directory: strings, integers, raw
//! binary, objectGUID, objectSid and FILETIME timestamps. These are used by
//! callers of the search engine; the engine itself never inspects entry
//! attributes.

use chrono::{DateTime, Utc};
use ldap3::SearchEntry;
use uuid::Uuid;

/// Offset between the Windows FILETIME epoch (1601) and the Unix epoch, in
/// seconds.
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// Get the first value of a string attribute.
pub fn pull_string<'a>(entry: &'a SearchEntry, attr: &str) -> Option<&'a str> {
    entry
        .attrs
        .get(attr)
        .and_then(|values| values.first())
        .map(String::as_str)
}

/// Get all values of a string attribute.
pub fn pull_strings<'a>(entry: &'a SearchEntry, attr: &str) -> Vec<&'a str> {
    entry
        .attrs
        .get(attr)
        .map(|values| values.iter().map(String::as_str).collect())
        .unwrap_or_default()
}

/// Get a numeric attribute as u32.
pub fn pull_u32(entry: &SearchEntry, attr: &str) -> Option<u32> {
    pull_string(entry, attr).and_then(|s| s.parse().ok())
}

/// Get a numeric attribute as u64 (uSNChanged, lastLogonTimestamp and
/// friends exceed 32 bits).
pub fn pull_u64(entry: &SearchEntry, attr: &str) -> Option<u64> {
    pull_string(entry, attr).and_then(|s| s.parse().ok())
}

/// Get the first value of a binary attribute.
pub fn pull_binary<'a>(entry: &'a SearchEntry, attr: &str) -> Option<&'a [u8]> {
    entry
        .bin_attrs
        .get(attr)
        .and_then(|values| values.first())
        .map(Vec::as_slice)
}

/// Decode an Active Directory objectGUID attribute.
///
/// AD stores the GUID with the first three fields little-endian.
pub fn pull_guid(entry: &SearchEntry, attr: &str) -> Option<Uuid> {
    let raw = pull_binary(entry, attr)?;
    let bytes: [u8; 16] = raw.try_into().ok()?;
    Some(Uuid::from_bytes_le(bytes))
}

/// Decode a binary Windows security identifier into its string form
/// (`S-1-5-21-...`).
///
/// Layout: revision (1 byte), sub-authority count (1 byte), a 48-bit
/// big-endian identifier authority, then `count` little-endian 32-bit
/// sub-authorities.
pub fn decode_sid(raw: &[u8]) -> Option<String> {
    if raw.len() < 8 {
        return None;
    }

    let revision = raw[0];
    let sub_count = raw[1] as usize;
    if raw.len() != 8 + sub_count * 4 {
        return None;
    }

    let mut authority: u64 = 0;
    for byte in &raw[2..8] {
        authority = (authority << 8) | u64::from(*byte);
    }

    let mut sid = format!("S-{}-{}", revision, authority);
    for i in 0..sub_count {
        let off = 8 + i * 4;
        let sub = u32::from_le_bytes([raw[off], raw[off + 1], raw[off + 2], raw[off + 3]]);
        sid.push('-');
        sid.push_str(&sub.to_string());
    }

    Some(sid)
}

/// Get an objectSid attribute in string form.
pub fn pull_sid(entry: &SearchEntry, attr: &str) -> Option<String> {
    pull_binary(entry, attr).and_then(decode_sid)
}

/// Convert a Windows FILETIME value (100ns ticks since 1601) to a UTC
/// timestamp. Zero and sentinel values map to `None`.
pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime <= 0 {
        return None;
    }

    let unix_secs = filetime / 10_000_000 - FILETIME_UNIX_DIFF;
    if unix_secs < 0 {
        return None;
    }

    DateTime::from_timestamp(unix_secs, 0)
}

/// Get a FILETIME attribute (lastLogonTimestamp, pwdLastSet, ...) as a UTC
/// timestamp.
pub fn pull_filetime(entry: &SearchEntry, attr: &str) -> Option<DateTime<Utc>> {
    pull_string(entry, attr)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(filetime_to_datetime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry() -> SearchEntry {
        let mut attrs = HashMap::new();
        attrs.insert("cn".to_string(), vec!["Ada Lovelace".to_string()]);
        attrs.insert(
            "mail".to_string(),
            vec!["ada@example.com".to_string(), "al@example.com".to_string()],
        );
        attrs.insert("uSNChanged".to_string(), vec!["8675309".to_string()]);
        attrs.insert(
            "lastLogonTimestamp".to_string(),
            // 2021-01-01T00:00:00Z as FILETIME
            vec!["132539328000000000".to_string()],
        );

        let mut bin_attrs = HashMap::new();
        // S-1-5-21-1-2-3
        bin_attrs.insert(
            "objectSid".to_string(),
            vec![vec![
                1, 4, 0, 0, 0, 0, 0, 5, 21, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0,
            ]],
        );

        SearchEntry {
            dn: "cn=Ada Lovelace,dc=example,dc=com".to_string(),
            attrs,
            bin_attrs,
        }
    }

    #[test]
    fn test_pull_string() {
        let e = entry();
        assert_eq!(pull_string(&e, "cn"), Some("Ada Lovelace"));
        assert_eq!(pull_string(&e, "missing"), None);
    }

    #[test]
    fn test_pull_strings() {
        let e = entry();
        assert_eq!(
            pull_strings(&e, "mail"),
            vec!["ada@example.com", "al@example.com"]
        );
        assert!(pull_strings(&e, "missing").is_empty());
    }

    #[test]
    fn test_pull_numbers() {
        let e = entry();
        assert_eq!(pull_u64(&e, "uSNChanged"), Some(8_675_309));
        assert_eq!(pull_u32(&e, "cn"), None);
    }

    #[test]
    fn test_pull_sid() {
        let e = entry();
        assert_eq!(pull_sid(&e, "objectSid"), Some("S-1-5-21-1-2-3".to_string()));
    }

    #[test]
    fn test_decode_sid_rejects_truncated() {
        assert_eq!(decode_sid(&[1, 4, 0, 0, 0, 0, 0, 5, 21, 0]), None);
        assert_eq!(decode_sid(&[]), None);
    }

    #[test]
    fn test_pull_guid_mixed_endian() {
        let mut e = entry();
        e.bin_attrs.insert(
            "objectGUID".to_string(),
            vec![vec![
                0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
                0x0e, 0x0f, 0x10,
            ]],
        );
        let guid = pull_guid(&e, "objectGUID").unwrap();
        assert_eq!(
            guid.to_string(),
            "01020304-0506-0708-090a-0b0c0d0e0f10"
        );
    }

    #[test]
    fn test_pull_filetime() {
        let e = entry();
        let ts = pull_filetime(&e, "lastLogonTimestamp").unwrap();
        assert_eq!(ts.to_rfc3339(), "2021-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_filetime_sentinels() {
        assert_eq!(filetime_to_datetime(0), None);
        assert_eq!(filetime_to_datetime(-1), None);
    }
}
