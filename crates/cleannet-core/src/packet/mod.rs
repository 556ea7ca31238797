//! Packet parsing and reply synthesis
//!
//! Low-level handling of the raw IP packets read from the tunnel device.
//! Only UDP is carried past this layer; everything else is reported as an
//! unsupported transport and dropped by the engine.

pub mod checksum;
mod reply;
mod types;

pub use reply::build_reply;
pub use types::*;

use crate::error::{Error, Result};
use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Maximum raw packet size read from the tunnel in a single operation
pub const MAX_PACKET_SIZE: usize = 32767;

/// IPv4 header length without options
const IPV4_MIN_HEADER_LEN: usize = 20;

/// IPv6 fixed header length
const IPV6_HEADER_LEN: usize = 40;

/// UDP header length
const UDP_HEADER_LEN: usize = 8;

/// A parsed UDP datagram envelope from a raw IP packet.
///
/// Immutable once parsed. The envelope is both the decoded view of an
/// inbound packet and the addressing template for the reply built by
/// [`build_reply`] (which swaps source and destination).
#[derive(Debug, Clone)]
pub struct PacketEnvelope {
    /// IP version of the original packet
    pub version: IpVersion,
    /// Source IP address
    pub src_addr: IpAddr,
    /// Destination IP address
    pub dst_addr: IpAddr,
    /// Source UDP port
    pub src_port: u16,
    /// Destination UDP port
    pub dst_port: u16,
    /// Raw UDP payload bytes
    payload: Bytes,
}

impl PacketEnvelope {
    /// Parse a raw IP packet into an envelope.
    ///
    /// The version nibble selects IPv4 or IPv6 parsing. Returns
    /// [`Error::UnsupportedTransport`] for anything that is not plain UDP,
    /// and [`Error::MalformedPacket`] / [`Error::PacketTooSmall`] for
    /// truncated or inconsistent headers.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::PacketTooSmall {
                expected: IPV4_MIN_HEADER_LEN,
                actual: 0,
            });
        }

        match (data[0] >> 4) & 0x0F {
            4 => Self::parse_ipv4(data),
            6 => Self::parse_ipv6(data),
            version => Err(Error::malformed(format!("Unknown IP version: {version}"))),
        }
    }

    fn parse_ipv4(data: &[u8]) -> Result<Self> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return Err(Error::PacketTooSmall {
                expected: IPV4_MIN_HEADER_LEN,
                actual: data.len(),
            });
        }

        let ip_header_len = ((data[0] & 0x0F) as usize) * 4;
        if ip_header_len < IPV4_MIN_HEADER_LEN {
            return Err(Error::malformed_at(
                format!("IPv4 header length {ip_header_len} below minimum"),
                0,
            ));
        }
        if data.len() < ip_header_len {
            return Err(Error::PacketTooSmall {
                expected: ip_header_len,
                actual: data.len(),
            });
        }

        let proto = data[9];
        if Transport::from_u8(proto) != Transport::Udp {
            return Err(Error::UnsupportedTransport { protocol: proto });
        }

        let src_addr = IpAddr::V4(Ipv4Addr::new(data[12], data[13], data[14], data[15]));
        let dst_addr = IpAddr::V4(Ipv4Addr::new(data[16], data[17], data[18], data[19]));

        let (src_port, dst_port, payload) = Self::parse_udp(data, ip_header_len)?;

        Ok(Self {
            version: IpVersion::V4,
            src_addr,
            dst_addr,
            src_port,
            dst_port,
            payload,
        })
    }

    fn parse_ipv6(data: &[u8]) -> Result<Self> {
        if data.len() < IPV6_HEADER_LEN {
            return Err(Error::PacketTooSmall {
                expected: IPV6_HEADER_LEN,
                actual: data.len(),
            });
        }

        // Extension headers before UDP are rejected along with other
        // protocols; tunnel DNS traffic carries none.
        let next_header = data[6];
        if Transport::from_u8(next_header) != Transport::Udp {
            return Err(Error::UnsupportedTransport {
                protocol: next_header,
            });
        }

        let mut src_bytes = [0u8; 16];
        let mut dst_bytes = [0u8; 16];
        src_bytes.copy_from_slice(&data[8..24]);
        dst_bytes.copy_from_slice(&data[24..40]);

        let (src_port, dst_port, payload) = Self::parse_udp(data, IPV6_HEADER_LEN)?;

        Ok(Self {
            version: IpVersion::V6,
            src_addr: IpAddr::V6(Ipv6Addr::from(src_bytes)),
            dst_addr: IpAddr::V6(Ipv6Addr::from(dst_bytes)),
            src_port,
            dst_port,
            payload,
        })
    }

    /// Parse the UDP header at `offset` and slice out the payload.
    fn parse_udp(data: &[u8], offset: usize) -> Result<(u16, u16, Bytes)> {
        if data.len() < offset + UDP_HEADER_LEN {
            return Err(Error::PacketTooSmall {
                expected: offset + UDP_HEADER_LEN,
                actual: data.len(),
            });
        }

        let src_port = u16::from_be_bytes([data[offset], data[offset + 1]]);
        let dst_port = u16::from_be_bytes([data[offset + 2], data[offset + 3]]);

        let udp_len = u16::from_be_bytes([data[offset + 4], data[offset + 5]]) as usize;
        if udp_len < UDP_HEADER_LEN || offset + udp_len > data.len() {
            return Err(Error::malformed_at(
                format!("UDP length {udp_len} inconsistent with packet"),
                offset + 4,
            ));
        }

        let payload = Bytes::copy_from_slice(&data[offset + UDP_HEADER_LEN..offset + udp_len]);
        Ok((src_port, dst_port, payload))
    }

    /// Get the raw UDP payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is IPv4
    pub fn is_ipv4(&self) -> bool {
        matches!(self.version, IpVersion::V4)
    }

    /// Check if this is IPv6
    pub fn is_ipv6(&self) -> bool {
        matches!(self.version, IpVersion::V6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_udp_packet() -> Vec<u8> {
        // Minimal IPv4 UDP packet with a 4-byte payload
        vec![
            // IPv4 header (20 bytes)
            0x45, 0x00, 0x00, 0x20, // Version, IHL, TOS, Total Length (32)
            0x00, 0x01, 0x00, 0x00, // ID, Flags, Fragment
            0x40, 0x11, 0x00, 0x00, // TTL, Protocol (UDP), Checksum
            0x0A, 0x00, 0x00, 0x01, // Source IP (10.0.0.1)
            0x0A, 0x00, 0x00, 0x02, // Dest IP (10.0.0.2)
            // UDP header (8 bytes)
            0xC0, 0x00, 0x00, 0x35, // Src Port (49152), Dst Port (53)
            0x00, 0x0C, 0x00, 0x00, // Length (12), Checksum
            // Payload
            0xDE, 0xAD, 0xBE, 0xEF,
        ]
    }

    #[test]
    fn test_parse_ipv4_udp() {
        let data = create_test_udp_packet();
        let envelope = PacketEnvelope::parse(&data).unwrap();

        assert!(envelope.is_ipv4());
        assert_eq!(envelope.src_addr, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(envelope.dst_addr, "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(envelope.src_port, 49152);
        assert_eq!(envelope.dst_port, 53);
        assert_eq!(envelope.payload(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_parse_ipv6_udp() {
        let mut data = vec![
            0x60, 0x00, 0x00, 0x00, // Version, TC, Flow label
            0x00, 0x0C, 0x11, 0x40, // Payload length (12), Next header (UDP), Hop limit
        ];
        data.extend_from_slice(&[0u8; 15]);
        data.push(0x01); // src ::1
        data.extend_from_slice(&[0u8; 15]);
        data.push(0x02); // dst ::2
        data.extend_from_slice(&[
            0xC0, 0x00, 0x00, 0x35, // Src Port, Dst Port (53)
            0x00, 0x0C, 0x00, 0x00, // Length (12), Checksum
            0xCA, 0xFE, 0xBA, 0xBE,
        ]);

        let envelope = PacketEnvelope::parse(&data).unwrap();
        assert!(envelope.is_ipv6());
        assert_eq!(envelope.dst_port, 53);
        assert_eq!(envelope.payload(), &[0xCA, 0xFE, 0xBA, 0xBE]);
    }

    #[test]
    fn test_parse_rejects_tcp() {
        let mut data = create_test_udp_packet();
        data[9] = 6; // TCP
        let result = PacketEnvelope::parse(&data);
        assert!(matches!(
            result,
            Err(Error::UnsupportedTransport { protocol: 6 })
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let data = [0x25u8; 40];
        assert!(matches!(
            PacketEnvelope::parse(&data),
            Err(Error::MalformedPacket { .. })
        ));
    }

    #[test]
    fn test_parse_too_small() {
        let data = vec![0x45, 0x00];
        assert!(matches!(
            PacketEnvelope::parse(&data),
            Err(Error::PacketTooSmall { .. })
        ));
    }

    #[test]
    fn test_parse_bad_udp_length() {
        let mut data = create_test_udp_packet();
        data[24] = 0xFF; // UDP length high byte way past the buffer
        assert!(matches!(
            PacketEnvelope::parse(&data),
            Err(Error::MalformedPacket { .. })
        ));
    }

    #[test]
    fn test_parse_honors_ipv4_options() {
        // IHL = 6 (24-byte header with one option word)
        let mut data = vec![
            0x46, 0x00, 0x00, 0x24, // Version, IHL=6, Total Length (36)
            0x00, 0x01, 0x00, 0x00, //
            0x40, 0x11, 0x00, 0x00, //
            0x0A, 0x00, 0x00, 0x01, //
            0x0A, 0x00, 0x00, 0x02, //
            0x00, 0x00, 0x00, 0x00, // options
        ];
        data.extend_from_slice(&[
            0x12, 0x34, 0x00, 0x35, // ports
            0x00, 0x0C, 0x00, 0x00, // UDP length 12
            0x01, 0x02, 0x03, 0x04,
        ]);

        let envelope = PacketEnvelope::parse(&data).unwrap();
        assert_eq!(envelope.src_port, 0x1234);
        assert_eq!(envelope.payload(), &[0x01, 0x02, 0x03, 0x04]);
    }
}
