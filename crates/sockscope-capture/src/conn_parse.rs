//! Kernel connection-table text -> typed connections
//!
//! Table layout (one row per socket, header line first):
//! `sl local_address rem_address st tx_queue:rx_queue tr tm->when retrnsmt uid timeout inode ...`
//! Addresses are hex with little-endian byte order for IPv4 and four
//! little-endian u32 chunks for IPv6. Malformed rows are skipped, never
//! fatal.

use sockscope_core::{Connection, Protocol, TcpConnection, UdpConnection};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Parse one table's text. The first line is the column header.
pub fn parse_table(text: &str, protocol: Protocol) -> Vec<Connection> {
    text.lines()
        .skip(1)
        .filter_map(|line| parse_row(line, protocol))
        .collect()
}

fn parse_row(line: &str, protocol: Protocol) -> Option<Connection> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 10 {
        return None;
    }

    let slot = parts[0].trim_end_matches(':').parse().ok()?;
    let (local_addr, local_port) = parse_hex_endpoint(parts[1])?;
    let (remote_addr, remote_port) = parse_hex_endpoint(parts[2])?;
    let state = u8::from_str_radix(parts[3], 16).ok()?;
    let (tx_queue, rx_queue) = parse_queues(parts[4])?;
    let uid = parts[7].parse().ok()?;
    let inode = parts[9].parse().ok()?;

    Some(match protocol {
        Protocol::Tcp => Connection::Tcp(TcpConnection {
            slot,
            local_addr,
            local_port,
            remote_addr,
            remote_port,
            state,
            tx_queue,
            rx_queue,
            uid,
            inode,
        }),
        // UDP rows keep addresses but report ports as 0
        Protocol::Udp => Connection::Udp(UdpConnection {
            slot,
            local_addr,
            remote_addr,
            state,
            tx_queue,
            rx_queue,
            uid,
            inode,
        }),
    })
}

/// `ADDR:PORT` where ADDR is 8 hex chars (v4) or 32 (v6).
fn parse_hex_endpoint(field: &str) -> Option<(IpAddr, u16)> {
    let (addr_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;

    let addr = match addr_hex.len() {
        8 => {
            let raw = u32::from_str_radix(addr_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(raw.to_le_bytes()))
        }
        32 => {
            let mut bytes = [0u8; 16];
            for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
                let raw = u32::from_str_radix(&addr_hex[i * 8..(i + 1) * 8], 16).ok()?;
                chunk.copy_from_slice(&raw.to_le_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(bytes))
        }
        _ => return None,
    };

    Some((addr, port))
}

/// `TX:RX`, both hex.
fn parse_queues(field: &str) -> Option<(u64, u64)> {
    let (tx, rx) = field.split_once(':')?;
    Some((
        u64::from_str_radix(tx, 16).ok()?,
        u64::from_str_radix(rx, 16).ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_TABLE: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F90 0200000A:01BB 01 00000001:00000002 00:00000000 00000000  1000        0 12345 1 ffff888 20 4 30 10 -1
   1: garbage line that should be skipped
";

    const UDP_TABLE: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops
   7: 00000000:0035 00000000:0000 07 00000000:00000000 00:00000000 00000000   102        0 22222 2 ffff888 0
";

    #[test]
    fn parses_tcp_rows() {
        let conns = parse_table(TCP_TABLE, Protocol::Tcp);
        assert_eq!(conns.len(), 1);

        let conn = &conns[0];
        assert_eq!(conn.protocol(), Protocol::Tcp);
        assert_eq!(conn.local_addr(), "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(conn.local_port(), 0x1F90);
        assert_eq!(conn.remote_addr(), "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(conn.remote_port(), 0x01BB);
        assert_eq!(conn.state(), 1);
        assert_eq!(conn.tx_queue(), 1);
        assert_eq!(conn.rx_queue(), 2);
        assert_eq!(conn.uid(), 1000);
        assert_eq!(conn.inode(), 12345);
    }

    #[test]
    fn udp_rows_drop_ports() {
        let conns = parse_table(UDP_TABLE, Protocol::Udp);
        assert_eq!(conns.len(), 1);

        let conn = &conns[0];
        assert_eq!(conn.protocol(), Protocol::Udp);
        assert_eq!(conn.local_port(), 0);
        assert_eq!(conn.remote_port(), 0);
        assert_eq!(conn.uid(), 102);
        assert_eq!(conn.inode(), 22222);
    }

    #[test]
    fn parses_v6_endpoints() {
        let table = "\
  sl  local_address                         rem_address                           st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000001000000:0050 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 333 1 ffff888
";
        let conns = parse_table(table, Protocol::Tcp);
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].local_addr(), "::1".parse::<IpAddr>().unwrap());
        assert_eq!(conns[0].local_port(), 0x50);
    }

    #[test]
    fn empty_table_parses_to_nothing() {
        assert!(parse_table("  sl  local_address ...\n", Protocol::Tcp).is_empty());
    }
}
