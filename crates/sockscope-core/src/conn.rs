//! Typed rows of the kernel connection tables
//!
//! A connection is immutable once parsed: pollers replace whole sets, they
//! never patch individual rows. The protocol set is closed (TCP, UDP), so
//! the variants live in one enum with a shared accessor surface rather than
//! behind a trait object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Transport protocol of a connection-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a TCP connection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConnection {
    /// Slot number of the row.
    pub slot: u64,
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,
    /// Kernel socket state code.
    pub state: u8,
    pub tx_queue: u64,
    pub rx_queue: u64,
    pub uid: u32,
    pub inode: u64,
}

/// One row of a UDP connection table.
///
/// UDP rows carry addresses, uid, and inode, but report both ports as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConnection {
    pub slot: u64,
    pub local_addr: IpAddr,
    pub remote_addr: IpAddr,
    pub state: u8,
    pub tx_queue: u64,
    pub rx_queue: u64,
    pub uid: u32,
    pub inode: u64,
}

/// A parsed connection-table row, tagged by protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Connection {
    Tcp(TcpConnection),
    Udp(UdpConnection),
}

impl Connection {
    pub fn protocol(&self) -> Protocol {
        match self {
            Connection::Tcp(_) => Protocol::Tcp,
            Connection::Udp(_) => Protocol::Udp,
        }
    }

    pub fn slot(&self) -> u64 {
        match self {
            Connection::Tcp(c) => c.slot,
            Connection::Udp(c) => c.slot,
        }
    }

    pub fn local_addr(&self) -> IpAddr {
        match self {
            Connection::Tcp(c) => c.local_addr,
            Connection::Udp(c) => c.local_addr,
        }
    }

    /// Local port; UDP rows report 0.
    pub fn local_port(&self) -> u16 {
        match self {
            Connection::Tcp(c) => c.local_port,
            Connection::Udp(_) => 0,
        }
    }

    pub fn remote_addr(&self) -> IpAddr {
        match self {
            Connection::Tcp(c) => c.remote_addr,
            Connection::Udp(c) => c.remote_addr,
        }
    }

    /// Remote port; UDP rows report 0.
    pub fn remote_port(&self) -> u16 {
        match self {
            Connection::Tcp(c) => c.remote_port,
            Connection::Udp(_) => 0,
        }
    }

    pub fn state(&self) -> u8 {
        match self {
            Connection::Tcp(c) => c.state,
            Connection::Udp(c) => c.state,
        }
    }

    pub fn tx_queue(&self) -> u64 {
        match self {
            Connection::Tcp(c) => c.tx_queue,
            Connection::Udp(c) => c.tx_queue,
        }
    }

    pub fn rx_queue(&self) -> u64 {
        match self {
            Connection::Tcp(c) => c.rx_queue,
            Connection::Udp(c) => c.rx_queue,
        }
    }

    pub fn uid(&self) -> u32 {
        match self {
            Connection::Tcp(c) => c.uid,
            Connection::Udp(c) => c.uid,
        }
    }

    /// Socket inode; 0 means the kernel did not expose one ("unresolved").
    pub fn inode(&self) -> u64 {
        match self {
            Connection::Tcp(c) => c.inode,
            Connection::Udp(c) => c.inode,
        }
    }

    /// Identity of this connection across polls.
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            protocol: self.protocol(),
            local_addr: self.local_addr(),
            local_port: self.local_port(),
            remote_addr: self.remote_addr(),
            remote_port: self.remote_port(),
        }
    }

    /// Directional flow id joining this connection to captured packets.
    pub fn flow_id(&self) -> String {
        flow_id(
            self.local_addr(),
            self.local_port(),
            self.remote_addr(),
            self.remote_port(),
        )
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} -> {}:{}",
            self.protocol(),
            self.local_addr(),
            self.local_port(),
            self.remote_addr(),
            self.remote_port()
        )
    }
}

/// Identity key of a connection: protocol plus 4-tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub protocol: Protocol,
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,
}

/// Directional flow id over a 4-tuple.
///
/// The two directions of one conversation produce distinct ids; aggregation
/// keys on the id exactly as resolved, without normalizing.
pub fn flow_id(local_addr: IpAddr, local_port: u16, remote_addr: IpAddr, remote_port: u16) -> String {
    format!("{local_addr}:{local_port}->{remote_addr}:{remote_port}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn tcp_row() -> Connection {
        Connection::Tcp(TcpConnection {
            slot: 0,
            local_addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            local_port: 8080,
            remote_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            remote_port: 443,
            state: 1,
            tx_queue: 0,
            rx_queue: 0,
            uid: 1000,
            inode: 4242,
        })
    }

    fn udp_row() -> Connection {
        Connection::Udp(UdpConnection {
            slot: 3,
            local_addr: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            remote_addr: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            state: 7,
            tx_queue: 0,
            rx_queue: 0,
            uid: 1000,
            inode: 5555,
        })
    }

    #[test]
    fn tcp_accessors_carry_ports() {
        let conn = tcp_row();
        assert_eq!(conn.protocol(), Protocol::Tcp);
        assert_eq!(conn.local_port(), 8080);
        assert_eq!(conn.remote_port(), 443);
        assert_eq!(conn.inode(), 4242);
    }

    #[test]
    fn udp_ports_report_zero() {
        let conn = udp_row();
        assert_eq!(conn.protocol(), Protocol::Udp);
        assert_eq!(conn.local_port(), 0);
        assert_eq!(conn.remote_port(), 0);
    }

    #[test]
    fn key_distinguishes_protocols() {
        let tcp = tcp_row().key();
        let mut udp = tcp_row().key();
        udp.protocol = Protocol::Udp;
        assert_ne!(tcp, udp);
    }

    #[test]
    fn flow_id_is_directional() {
        let a = flow_id(
            IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
            80,
            IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8)),
            443,
        );
        let b = flow_id(
            IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8)),
            443,
            IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
            80,
        );
        assert_ne!(a, b);
    }
}
