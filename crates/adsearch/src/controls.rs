//! LDAP control construction and parsing
//!
//! Typed builders and parsers for the controls that drive retrieval:
//! paged results (RFC 2696), server-side sort (RFC 2891), Virtual List
//! View (draft-ietf-ldapext-ldapv3-vlv-09) and the Active Directory
//! domain-scope control. Values are BER-encoded with the same ASN.1
//! tooling `ldap3` uses for its built-in controls.

use ldap3::asn1::{
    parse_tag, parse_uint, write, ASNTag, Enumerated, Integer, OctetString, Sequence, StructureTag,
    Tag, TagClass,
};
use ldap3::controls::{Control, MakeCritical, PagedResults, RawControl};

use bytes::BytesMut;

use crate::error::{SearchError, SearchResult};

/// Paged results control (RFC 2696).
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Server-side sort request control (RFC 2891).
pub const SORT_REQUEST_OID: &str = "1.2.840.113556.1.4.473";

/// Server-side sort response control (RFC 2891).
pub const SORT_RESPONSE_OID: &str = "1.2.840.113556.1.4.474";

/// Virtual List View request control.
pub const VLV_REQUEST_OID: &str = "2.16.840.1.113730.3.4.9";

/// Virtual List View response control.
pub const VLV_RESPONSE_OID: &str = "2.16.840.1.113730.3.4.10";

/// Active Directory domain-scope control: do not generate referrals.
pub const DOMAIN_SCOPE_OID: &str = "1.2.840.113556.1.4.1339";

/// Build the domain-scope ("no referrals") control.
///
/// Value-less and non-critical, so servers that do not know it ignore it.
pub fn domain_scope_control() -> RawControl {
    RawControl {
        ctype: DOMAIN_SCOPE_OID.to_owned(),
        crit: false,
        val: None,
    }
}

/// Build a paged results request control for the given page size and cookie.
///
/// The cookie must be empty on the first request and echoed back verbatim
/// on every continuation request.
pub fn paged_control(page_size: i32, cookie: Vec<u8>) -> RawControl {
    PagedResults {
        size: page_size,
        cookie,
    }
    .critical()
    .into()
}

/// Build a server-side sort request control with a single ascending key.
pub fn sort_control(sort_attr: &str) -> SearchResult<RawControl> {
    let key = Tag::Sequence(Sequence {
        inner: vec![Tag::OctetString(OctetString {
            inner: sort_attr.as_bytes().to_vec(),
            ..Default::default()
        })],
        ..Default::default()
    });
    let keylist = Tag::Sequence(Sequence {
        inner: vec![key],
        ..Default::default()
    });

    let mut buf = BytesMut::new();
    write::encode_into(&mut buf, keylist.into_structure())
        .map_err(|e| SearchError::internal(format!("failed to encode sort control: {}", e)))?;

    Ok(RawControl {
        ctype: SORT_REQUEST_OID.to_owned(),
        crit: true,
        val: Some(buf.to_vec()),
    })
}

/// Virtual List View request: a window into a server-side sorted list.
#[derive(Debug, Clone)]
pub struct VlvRequest {
    /// Number of entries before the target offset.
    pub before_count: u32,
    /// Number of entries after the target offset.
    pub after_count: u32,
    /// 1-based target offset into the sorted list.
    pub offset: u32,
    /// Client's estimate of the list size (0 or a previous server estimate).
    pub content_count: u32,
    /// Opaque server context from a previous response, empty on first use.
    pub context: Vec<u8>,
}

impl VlvRequest {
    /// Encode into a request control.
    pub fn to_control(&self) -> SearchResult<RawControl> {
        let by_offset = Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: 0,
            inner: vec![
                Tag::Integer(Integer {
                    inner: i64::from(self.offset),
                    ..Default::default()
                }),
                Tag::Integer(Integer {
                    inner: i64::from(self.content_count),
                    ..Default::default()
                }),
            ],
        });

        let mut inner = vec![
            Tag::Integer(Integer {
                inner: i64::from(self.before_count),
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: i64::from(self.after_count),
                ..Default::default()
            }),
            by_offset,
        ];
        if !self.context.is_empty() {
            inner.push(Tag::OctetString(OctetString {
                inner: self.context.clone(),
                ..Default::default()
            }));
        }

        let mut buf = BytesMut::new();
        write::encode_into(
            &mut buf,
            Tag::Sequence(Sequence {
                inner,
                ..Default::default()
            })
            .into_structure(),
        )
        .map_err(|e| SearchError::internal(format!("failed to encode vlv control: {}", e)))?;

        Ok(RawControl {
            ctype: VLV_REQUEST_OID.to_owned(),
            crit: true,
            val: Some(buf.to_vec()),
        })
    }
}

/// Virtual List View response: the server's view of the requested window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlvResponse {
    /// Server's 1-based position of the target entry.
    pub target_position: u32,
    /// Server's estimate of the total list size.
    pub content_count: u32,
    /// Server-side result code for the VLV operation (0 on success).
    pub result_code: u32,
    /// Opaque context to echo in the next request, possibly empty.
    pub context: Vec<u8>,
}

impl VlvResponse {
    /// Parse a VLV response control value.
    pub fn parse(val: &[u8]) -> SearchResult<VlvResponse> {
        let tag = match parse_tag(val) {
            Ok((_, tag)) => tag,
            _ => {
                return Err(SearchError::protocol_parse_recoverable(
                    "vlv response control is not valid BER",
                ))
            }
        };

        let mut comps = tag
            .expect_constructed()
            .ok_or_else(|| {
                SearchError::protocol_parse_recoverable("vlv response control is not a sequence")
            })?
            .into_iter();

        let target_position = parse_uint_comp(comps.next(), "targetPosition")?;
        let content_count = parse_uint_comp(comps.next(), "contentCount")?;
        let result_code = parse_uint_comp(comps.next(), "virtualListViewResult")?;
        let context = match comps.next() {
            Some(tag) => tag.expect_primitive().ok_or_else(|| {
                SearchError::protocol_parse_recoverable("vlv contextID is not primitive")
            })?,
            None => Vec::new(),
        };

        Ok(VlvResponse {
            target_position,
            content_count,
            result_code,
            context,
        })
    }

    /// Encode into a response control, as a directory server would.
    ///
    /// The engine only parses VLV responses; this direction exists for mock
    /// servers and tests.
    pub fn to_control(&self) -> RawControl {
        let mut inner = vec![
            Tag::Integer(Integer {
                inner: i64::from(self.target_position),
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: i64::from(self.content_count),
                ..Default::default()
            }),
            Tag::Enumerated(Enumerated {
                inner: i64::from(self.result_code),
                ..Default::default()
            }),
        ];
        if !self.context.is_empty() {
            inner.push(Tag::OctetString(OctetString {
                inner: self.context.clone(),
                ..Default::default()
            }));
        }

        let mut buf = BytesMut::new();
        write::encode_into(
            &mut buf,
            Tag::Sequence(Sequence {
                inner,
                ..Default::default()
            })
            .into_structure(),
        )
        .expect("vlv response encoding is infallible for in-memory buffers");

        RawControl {
            ctype: VLV_RESPONSE_OID.to_owned(),
            crit: false,
            val: Some(buf.to_vec()),
        }
    }
}

/// Find the VLV response control among a set of response controls.
pub fn find_vlv_response(controls: &[Control]) -> Option<&RawControl> {
    controls
        .iter()
        .map(|Control(_, raw)| raw)
        .find(|raw| raw.ctype == VLV_RESPONSE_OID)
}

/// Find the paged results response control among a set of response controls.
pub fn find_paged_response(controls: &[Control]) -> Option<&RawControl> {
    controls
        .iter()
        .map(|Control(_, raw)| raw)
        .find(|raw| raw.ctype == PAGED_RESULTS_OID)
}

/// Parse a paged results response control value into (size, cookie).
///
/// An ambiguous cookie cannot be resumed from, so malformed values are
/// reported as non-recoverable.
pub fn parse_paged_value(val: &[u8]) -> SearchResult<(u32, Vec<u8>)> {
    let tag = match parse_tag(val) {
        Ok((_, tag)) => tag,
        _ => {
            return Err(SearchError::protocol_parse(
                "paged results control is not valid BER",
            ))
        }
    };

    let mut comps = tag
        .expect_constructed()
        .ok_or_else(|| SearchError::protocol_parse("paged results control is not a sequence"))?
        .into_iter();

    let size = match comps.next().and_then(StructureTag::expect_primitive) {
        Some(payload) => match parse_uint(payload.as_slice()) {
            Ok((_, v)) => v as u32,
            _ => return Err(SearchError::protocol_parse("paged results size is malformed")),
        },
        None => return Err(SearchError::protocol_parse("paged results size is missing")),
    };

    let cookie = comps
        .next()
        .and_then(StructureTag::expect_primitive)
        .ok_or_else(|| SearchError::protocol_parse("paged results cookie is missing"))?;

    Ok((size, cookie))
}

fn parse_uint_comp(tag: Option<StructureTag>, field: &str) -> SearchResult<u32> {
    let payload = tag.and_then(StructureTag::expect_primitive).ok_or_else(|| {
        SearchError::protocol_parse_recoverable(format!("vlv response {} is missing", field))
    })?;
    match parse_uint(payload.as_slice()) {
        Ok((_, v)) => Ok(v as u32),
        _ => Err(SearchError::protocol_parse_recoverable(format!(
            "vlv response {} is malformed",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_scope_control_shape() {
        let ctrl = domain_scope_control();
        assert_eq!(ctrl.ctype, DOMAIN_SCOPE_OID);
        assert!(!ctrl.crit);
        assert!(ctrl.val.is_none());
    }

    #[test]
    fn test_paged_control_round_trip() {
        // Our parser must understand what ldap3's own encoder produces.
        let ctrl = paged_control(250, b"cookie".to_vec());
        assert_eq!(ctrl.ctype, PAGED_RESULTS_OID);
        assert!(ctrl.crit);

        let (size, cookie) = parse_paged_value(ctrl.val.as_deref().unwrap()).unwrap();
        assert_eq!(size, 250);
        assert_eq!(cookie, b"cookie");
    }

    #[test]
    fn test_paged_malformed_is_not_recoverable() {
        let err = parse_paged_value(&[0xff, 0x00]).unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_sort_control_encodes() {
        let ctrl = sort_control("sAMAccountName").unwrap();
        assert_eq!(ctrl.ctype, SORT_REQUEST_OID);
        assert!(ctrl.crit);
        // SEQUENCE OF SEQUENCE { OCTET STRING } carrying the attribute name
        let val = ctrl.val.unwrap();
        assert_eq!(val[0], 0x30);
        assert!(val
            .windows("sAMAccountName".len())
            .any(|w| w == "sAMAccountName".as_bytes()));
    }

    #[test]
    fn test_vlv_response_round_trip() {
        let resp = VlvResponse {
            target_position: 42,
            content_count: 1500,
            result_code: 53,
            context: b"ctx".to_vec(),
        };
        let ctrl = resp.to_control();
        assert_eq!(ctrl.ctype, VLV_RESPONSE_OID);

        let parsed = VlvResponse::parse(ctrl.val.as_deref().unwrap()).unwrap();
        assert_eq!(parsed, resp);
    }

    #[test]
    fn test_vlv_response_without_context() {
        let resp = VlvResponse {
            target_position: 1,
            content_count: 10,
            result_code: 0,
            context: Vec::new(),
        };
        let parsed = VlvResponse::parse(resp.to_control().val.as_deref().unwrap()).unwrap();
        assert!(parsed.context.is_empty());
    }

    #[test]
    fn test_vlv_malformed_is_recoverable() {
        let err = VlvResponse::parse(&[0x02, 0x01, 0x00]).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_find_response_controls() {
        let ctrls = vec![
            Control(None, domain_scope_control()),
            Control(
                None,
                VlvResponse {
                    target_position: 1,
                    content_count: 1,
                    result_code: 0,
                    context: Vec::new(),
                }
                .to_control(),
            ),
        ];

        assert!(find_vlv_response(&ctrls).is_some());
        assert!(find_paged_response(&ctrls).is_none());
    }
}
