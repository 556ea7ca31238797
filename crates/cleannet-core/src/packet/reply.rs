//! Reply packet synthesis
//!
//! Builds a complete, correctly-checksummed reply packet from an original
//! request envelope and a new UDP payload. The reply originates from the
//! original destination and is addressed to the original source, so the
//! tunnel routes it straight back to the requesting process.

use super::checksum;
use super::{IpVersion, PacketEnvelope, UDP_HEADER_LEN};
use crate::error::{Error, Result};
use std::net::IpAddr;

/// TTL / hop limit stamped on synthesized replies
const REPLY_TTL: u8 = 64;

/// Largest UDP payload that fits an IPv4 packet (65535 - 20 - 8)
const MAX_REPLY_PAYLOAD: usize = 65507;

/// Build a raw reply packet for `original`, carrying `payload`.
///
/// Source and destination (address and port) are swapped relative to the
/// original. The IP family is always preserved: an IPv4 request yields an
/// IPv4 reply, an IPv6 request an IPv6 reply. Fresh minimal headers are
/// synthesized; the UDP checksum is recomputed over the appropriate
/// pseudo-header, and for IPv4 the header checksum as well.
pub fn build_reply(original: &PacketEnvelope, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_REPLY_PAYLOAD {
        return Err(Error::malformed(format!(
            "Reply payload of {} bytes exceeds maximum datagram size",
            payload.len()
        )));
    }

    match (original.version, original.dst_addr, original.src_addr) {
        (IpVersion::V4, IpAddr::V4(reply_src), IpAddr::V4(reply_dst)) => Ok(build_reply_v4(
            reply_src.octets(),
            reply_dst.octets(),
            original.dst_port,
            original.src_port,
            payload,
        )),
        (IpVersion::V6, IpAddr::V6(reply_src), IpAddr::V6(reply_dst)) => Ok(build_reply_v6(
            reply_src.octets(),
            reply_dst.octets(),
            original.dst_port,
            original.src_port,
            payload,
        )),
        // An envelope never mixes families; parse() guarantees it.
        _ => Err(Error::malformed(
            "Envelope IP version does not match its addresses",
        )),
    }
}

fn build_udp_segment(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = (UDP_HEADER_LEN + payload.len()) as u16;
    let mut segment = Vec::with_capacity(UDP_HEADER_LEN + payload.len());
    segment.extend_from_slice(&src_port.to_be_bytes());
    segment.extend_from_slice(&dst_port.to_be_bytes());
    segment.extend_from_slice(&udp_len.to_be_bytes());
    segment.extend_from_slice(&[0x00, 0x00]); // Checksum placeholder
    segment.extend_from_slice(payload);
    segment
}

/// A computed checksum of zero is transmitted as 0xFFFF (RFC 768 / RFC 8200).
fn fold_udp_checksum(cksum: u16) -> u16 {
    if cksum == 0 {
        0xFFFF
    } else {
        cksum
    }
}

fn build_reply_v4(
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let total_len = (20 + UDP_HEADER_LEN + payload.len()) as u16;

    let mut packet = Vec::with_capacity(total_len as usize);

    // IPv4 header
    packet.push(0x45); // Version (4) + IHL (5)
    packet.push(0x00); // DSCP + ECN
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00]); // Identification
    packet.extend_from_slice(&[0x40, 0x00]); // Flags (DF) + Fragment Offset
    packet.push(REPLY_TTL);
    packet.push(17); // Protocol (UDP)
    packet.extend_from_slice(&[0x00, 0x00]); // Header checksum placeholder
    packet.extend_from_slice(&src_ip);
    packet.extend_from_slice(&dst_ip);

    let header_cksum = checksum::ipv4_header_checksum(&packet[..20]);
    packet[10..12].copy_from_slice(&header_cksum.to_be_bytes());

    // UDP segment
    let mut segment = build_udp_segment(src_port, dst_port, payload);
    let udp_cksum = fold_udp_checksum(checksum::udp_checksum_v4(&src_ip, &dst_ip, &segment));
    segment[6..8].copy_from_slice(&udp_cksum.to_be_bytes());

    packet.extend_from_slice(&segment);
    packet
}

fn build_reply_v6(
    src_ip: [u8; 16],
    dst_ip: [u8; 16],
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let payload_len = (UDP_HEADER_LEN + payload.len()) as u16;

    let mut packet = Vec::with_capacity(40 + payload_len as usize);

    // IPv6 header
    packet.push(0x60); // Version (6) + traffic class high nibble
    packet.extend_from_slice(&[0x00, 0x00, 0x00]); // Traffic class low + flow label
    packet.extend_from_slice(&payload_len.to_be_bytes());
    packet.push(17); // Next header (UDP)
    packet.push(REPLY_TTL); // Hop limit
    packet.extend_from_slice(&src_ip);
    packet.extend_from_slice(&dst_ip);

    // UDP segment, checksum mandatory over the IPv6 pseudo-header
    let mut segment = build_udp_segment(src_port, dst_port, payload);
    let udp_cksum = fold_udp_checksum(checksum::udp_checksum_v6(&src_ip, &dst_ip, &segment));
    segment[6..8].copy_from_slice(&udp_cksum.to_be_bytes());

    packet.extend_from_slice(&segment);
    packet
}
