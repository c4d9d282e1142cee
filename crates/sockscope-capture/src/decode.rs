//! Minimal frame decoding: IP addresses and TCP ports
//!
//! Only what attribution needs comes out of a frame: the address pair, TCP
//! ports when present, and the frame length. The frame's source maps to
//! the local side. UDP ports are not extracted from captured frames; UDP
//! connection rows carry zero ports too, so the flow ids still line up.

use sockscope_core::PacketEvent;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const IP_PROTO_TCP: u8 = 6;

/// Decode one captured frame. Fields that cannot be resolved keep their
/// zero defaults; decoding is total over arbitrary bytes.
pub fn decode_frame(device: &str, timestamp_ns: i64, data: &[u8]) -> PacketEvent {
    let mut event = PacketEvent::empty(device, timestamp_ns, data.len() as u64);

    if data.len() < 14 {
        return event;
    }

    let ethertype = u16::from_be_bytes([data[12], data[13]]);
    match ethertype {
        ETHERTYPE_IPV4 => decode_ipv4(&data[14..], &mut event),
        ETHERTYPE_IPV6 => decode_ipv6(&data[14..], &mut event),
        _ => {}
    }

    event
}

fn decode_ipv4(ip: &[u8], event: &mut PacketEvent) {
    if ip.len() < 20 || ip[0] >> 4 != 4 {
        return;
    }

    event.local_addr = IpAddr::V4(Ipv4Addr::new(ip[12], ip[13], ip[14], ip[15]));
    event.remote_addr = IpAddr::V4(Ipv4Addr::new(ip[16], ip[17], ip[18], ip[19]));

    let header_len = ((ip[0] & 0x0F) as usize) * 4;
    if ip.len() < header_len {
        return;
    }

    if ip[9] == IP_PROTO_TCP {
        decode_tcp_ports(&ip[header_len..], event);
    }
}

fn decode_ipv6(ip: &[u8], event: &mut PacketEvent) {
    if ip.len() < 40 || ip[0] >> 4 != 6 {
        return;
    }

    let mut src = [0u8; 16];
    let mut dst = [0u8; 16];
    src.copy_from_slice(&ip[8..24]);
    dst.copy_from_slice(&ip[24..40]);
    event.local_addr = IpAddr::V6(Ipv6Addr::from(src));
    event.remote_addr = IpAddr::V6(Ipv6Addr::from(dst));

    if ip[6] == IP_PROTO_TCP {
        decode_tcp_ports(&ip[40..], event);
    }
}

fn decode_tcp_ports(tcp: &[u8], event: &mut PacketEvent) {
    if tcp.len() < 4 {
        return;
    }
    event.local_port = u16::from_be_bytes([tcp[0], tcp[1]]);
    event.remote_port = u16::from_be_bytes([tcp[2], tcp[3]]);
}
