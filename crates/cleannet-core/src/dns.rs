//! DNS message parsing and block-response construction
//!
//! Handles exactly what the interception pipeline needs from the DNS wire
//! format: the 12-byte header, the first question record, and the synthesis
//! of a negative response carrying an authority SOA record.

use crate::error::{Error, Result};

/// DNS header length
const HEADER_LEN: usize = 12;

/// Maximum encoded hostname length (DNS standard)
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label
const MAX_LABEL_LEN: usize = 63;

/// QR bit in the flags high byte
const FLAG_QR: u8 = 0x80;

/// NXDOMAIN response code
const RCODE_NXDOMAIN: u8 = 0x03;

/// TTL of the synthesized authority record, seconds
const BLOCK_TTL: u32 = 300;

/// Placeholder zone named in synthesized negative responses. `.invalid` is
/// reserved (RFC 2606) and can never collide with a real domain.
const BLOCK_ZONE: &str = "blocked.invalid";

/// Mailbox name for the synthesized SOA record
const BLOCK_MBOX: &str = "admin.blocked.invalid";

/// A parsed DNS query.
///
/// Retains the raw header and first-question bytes so a response can be
/// synthesized referencing the original transaction id and question.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    /// Transaction id
    pub id: u16,
    /// Question name, dot-joined, case as received
    pub name: String,
    /// Question type
    pub qtype: u16,
    /// Question class
    pub qclass: u16,
    /// Original header + first question wire bytes
    raw: Vec<u8>,
}

impl DnsQuery {
    /// Parse a DNS query from a UDP payload.
    ///
    /// Fails with [`Error::NotDns`] when the payload is shorter than a DNS
    /// header, carries no question, or the question name is malformed.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < HEADER_LEN {
            return Err(Error::not_dns(format!(
                "payload of {} bytes is shorter than a DNS header",
                payload.len()
            )));
        }

        let id = u16::from_be_bytes([payload[0], payload[1]]);

        let qdcount = u16::from_be_bytes([payload[4], payload[5]]);
        if qdcount == 0 {
            return Err(Error::not_dns("message has no question"));
        }

        // Question name: length-prefixed labels, zero terminated
        let mut pos = HEADER_LEN;
        let mut labels: Vec<&str> = Vec::new();
        let mut name_len = 0usize;

        loop {
            if pos >= payload.len() {
                return Err(Error::not_dns("question name is truncated"));
            }
            let label_len = payload[pos] as usize;
            if label_len == 0 {
                pos += 1;
                break;
            }
            // Compression pointers never appear in the question of a query
            if label_len > MAX_LABEL_LEN {
                return Err(Error::not_dns(format!(
                    "invalid label length {label_len}"
                )));
            }
            pos += 1;
            if pos + label_len > payload.len() {
                return Err(Error::not_dns("label runs past end of payload"));
            }
            name_len += label_len + 1;
            if name_len > MAX_NAME_LEN {
                return Err(Error::not_dns("question name exceeds 253 octets"));
            }
            let label = std::str::from_utf8(&payload[pos..pos + label_len])
                .map_err(|_| Error::not_dns("label is not valid UTF-8"))?;
            labels.push(label);
            pos += label_len;
        }

        if labels.is_empty() {
            return Err(Error::not_dns("question name is empty"));
        }

        if pos + 4 > payload.len() {
            return Err(Error::not_dns("question type/class truncated"));
        }
        let qtype = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
        let qclass = u16::from_be_bytes([payload[pos + 2], payload[pos + 3]]);
        let question_end = pos + 4;

        Ok(Self {
            id,
            name: labels.join("."),
            qtype,
            qclass,
            raw: payload[..question_end].to_vec(),
        })
    }

    /// Question name lower-cased for block-list matching
    pub fn match_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Original header + first question wire bytes
    pub fn raw_question(&self) -> &[u8] {
        &self.raw
    }
}

/// Build a complete negative response for a blocked query.
///
/// Starts from the original header and question, sets the QR bit and
/// RCODE=NXDOMAIN, zeroes the answer/additional counts, and appends one
/// authority-section SOA record for the placeholder zone. Returns the full
/// DNS message wire bytes.
pub fn build_block_response(query: &DnsQuery) -> Vec<u8> {
    let mut out = query.raw.clone();

    out[2] |= FLAG_QR;
    out[3] = (out[3] & 0xF0) | RCODE_NXDOMAIN;

    // Only the first question is echoed back
    out[4..6].copy_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    out[6..8].copy_from_slice(&0u16.to_be_bytes()); // ANCOUNT
    out[8..10].copy_from_slice(&1u16.to_be_bytes()); // NSCOUNT
    out[10..12].copy_from_slice(&0u16.to_be_bytes()); // ARCOUNT

    // Authority section: SOA blocked.invalid.
    encode_name(&mut out, BLOCK_ZONE);
    out.extend_from_slice(&6u16.to_be_bytes()); // TYPE SOA
    out.extend_from_slice(&1u16.to_be_bytes()); // CLASS IN
    out.extend_from_slice(&BLOCK_TTL.to_be_bytes());

    let mut rdata = Vec::with_capacity(64);
    encode_name(&mut rdata, BLOCK_ZONE); // MNAME
    encode_name(&mut rdata, BLOCK_MBOX); // RNAME
    rdata.extend_from_slice(&1u32.to_be_bytes()); // Serial
    rdata.extend_from_slice(&3600u32.to_be_bytes()); // Refresh
    rdata.extend_from_slice(&600u32.to_be_bytes()); // Retry
    rdata.extend_from_slice(&86400u32.to_be_bytes()); // Expire
    rdata.extend_from_slice(&BLOCK_TTL.to_be_bytes()); // Minimum

    out.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    out.extend_from_slice(&rdata);

    out
}

/// Encode a dotted name as length-prefixed labels with a zero terminator.
fn encode_name(buf: &mut Vec<u8>, name: &str) {
    for label in name.split('.') {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a well-formed DNS query payload for `domain`.
    pub(crate) fn build_query(id: u16, domain: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&[0x01, 0x00]); // Flags: RD
        payload.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        encode_name(&mut payload, domain);
        payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // A, IN
        payload
    }

    #[test]
    fn test_parse_query() {
        let payload = build_query(0x1234, "ads.example.com");
        let query = DnsQuery::parse(&payload).unwrap();

        assert_eq!(query.id, 0x1234);
        assert_eq!(query.name, "ads.example.com");
        assert_eq!(query.qtype, 1);
        assert_eq!(query.qclass, 1);
        assert_eq!(query.raw_question(), payload.as_slice());
    }

    #[test]
    fn test_parse_preserves_case_but_matches_lowered() {
        let payload = build_query(1, "Ads.Example.COM");
        let query = DnsQuery::parse(&payload).unwrap();

        assert_eq!(query.name, "Ads.Example.COM");
        assert_eq!(query.match_name(), "ads.example.com");
    }

    #[test]
    fn test_parse_rejects_short_payload() {
        assert!(DnsQuery::parse(&[0x12, 0x34]).is_err());
    }

    #[test]
    fn test_parse_rejects_zero_questions() {
        let mut payload = build_query(1, "example.com");
        payload[4] = 0;
        payload[5] = 0;
        assert!(matches!(
            DnsQuery::parse(&payload),
            Err(Error::NotDns(_))
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_name() {
        let payload = build_query(1, "example.com");
        // Cut the payload inside the name
        assert!(DnsQuery::parse(&payload[..14]).is_err());
    }

    #[test]
    fn test_parse_rejects_compression_pointer() {
        let mut payload = build_query(1, "example.com");
        payload[12] = 0xC0; // pointer marker where a label length belongs
        assert!(DnsQuery::parse(&payload).is_err());
    }

    #[test]
    fn test_block_response_shape() {
        let payload = build_query(0xBEEF, "blocked.test");
        let query = DnsQuery::parse(&payload).unwrap();
        let response = build_block_response(&query);

        // Original transaction id
        assert_eq!(&response[0..2], &0xBEEFu16.to_be_bytes());
        // QR set
        assert_eq!(response[2] & 0x80, 0x80);
        // RCODE = NXDOMAIN
        assert_eq!(response[3] & 0x0F, 0x03);
        // QD=1, AN=0, NS=1, AR=0
        assert_eq!(u16::from_be_bytes([response[4], response[5]]), 1);
        assert_eq!(u16::from_be_bytes([response[6], response[7]]), 0);
        assert_eq!(u16::from_be_bytes([response[8], response[9]]), 1);
        assert_eq!(u16::from_be_bytes([response[10], response[11]]), 0);
        // Question section is echoed verbatim
        assert_eq!(&response[12..payload.len()], &payload[12..]);
    }

    #[test]
    fn test_block_response_soa_record() {
        let payload = build_query(7, "blocked.test");
        let query = DnsQuery::parse(&payload).unwrap();
        let response = build_block_response(&query);

        let mut pos = payload.len();
        // Owner name: 7"blocked"7"invalid"0
        assert_eq!(response[pos], 7);
        assert_eq!(&response[pos + 1..pos + 8], b"blocked");
        assert_eq!(response[pos + 8], 7);
        assert_eq!(&response[pos + 9..pos + 16], b"invalid");
        assert_eq!(response[pos + 16], 0);
        pos += 17;

        // TYPE SOA, CLASS IN, TTL 300
        assert_eq!(u16::from_be_bytes([response[pos], response[pos + 1]]), 6);
        assert_eq!(u16::from_be_bytes([response[pos + 2], response[pos + 3]]), 1);
        assert_eq!(
            u32::from_be_bytes([
                response[pos + 4],
                response[pos + 5],
                response[pos + 6],
                response[pos + 7]
            ]),
            300
        );
        pos += 8;

        let rdlength =
            u16::from_be_bytes([response[pos], response[pos + 1]]) as usize;
        pos += 2;
        assert_eq!(pos + rdlength, response.len());

        // SOA numeric fields are the last 20 bytes of rdata
        let numbers = &response[response.len() - 20..];
        let field = |i: usize| {
            u32::from_be_bytes([
                numbers[i * 4],
                numbers[i * 4 + 1],
                numbers[i * 4 + 2],
                numbers[i * 4 + 3],
            ])
        };
        assert_eq!(field(0), 1); // serial
        assert_eq!(field(1), 3600); // refresh
        assert_eq!(field(2), 600); // retry
        assert_eq!(field(3), 86400); // expire
        assert_eq!(field(4), 300); // minimum
    }

    #[test]
    fn test_block_response_drops_extra_questions() {
        // Two questions; only the first survives in the response counts
        let mut payload = build_query(9, "first.test");
        payload[5] = 2;
        encode_name(&mut payload, "second.test");
        payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let query = DnsQuery::parse(&payload).unwrap();
        assert_eq!(query.name, "first.test");

        let response = build_block_response(&query);
        assert_eq!(u16::from_be_bytes([response[4], response[5]]), 1);
    }
}
