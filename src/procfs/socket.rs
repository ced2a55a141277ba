//! Kernel socket tables: `/proc/net/{tcp,tcp6,udp,udp6}`.
//!
//! Each row after the header looks like
//!
//! ```text
//!   sl  local_address rem_address   st tx_queue rx_queue ...
//!    0: 0100007F:0277 00000000:0000 0A 00000000:00000000 ...
//! ```
//!
//! Addresses are hex-encoded in the kernel's in-memory layout: IPv4 as one
//! 32-bit word and IPv6 as four 32-bit words, each in host byte order.

use std::io::BufRead;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// State code a listening socket reports in this protocol's table.
    ///
    /// TCP uses `TCP_LISTEN`; unconnected UDP sockets report `TCP_CLOSE`.
    pub fn listening_state(self) -> u8 {
        match self {
            Protocol::Tcp => 0x0A,
            Protocol::Udp => 0x07,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IpVersion {
    V4,
    V6,
}

/// One of the four tables, with the file name it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketTable {
    pub protocol: Protocol,
    pub version: IpVersion,
}

impl SocketTable {
    pub const ALL: [SocketTable; 4] = [
        SocketTable::new(Protocol::Tcp, IpVersion::V4),
        SocketTable::new(Protocol::Tcp, IpVersion::V6),
        SocketTable::new(Protocol::Udp, IpVersion::V4),
        SocketTable::new(Protocol::Udp, IpVersion::V6),
    ];

    pub const fn new(protocol: Protocol, version: IpVersion) -> Self {
        Self { protocol, version }
    }

    /// File name below `/proc/net`.
    pub fn file_name(&self) -> &'static str {
        match (self.protocol, self.version) {
            (Protocol::Tcp, IpVersion::V4) => "tcp",
            (Protocol::Tcp, IpVersion::V6) => "tcp6",
            (Protocol::Udp, IpVersion::V4) => "udp",
            (Protocol::Udp, IpVersion::V6) => "udp6",
        }
    }
}

/// States counted as an active connection.
///
/// ESTABLISHED, SYN_SENT, SYN_RECV, FIN_WAIT1, FIN_WAIT2, TIME_WAIT,
/// CLOSE_WAIT, LAST_ACK, CLOSING, NEW_SYN_RECV.
const ACTIVE_STATES: [u8; 10] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x09, 0x0B, 0x0C];

pub fn is_active_state(state: u8) -> bool {
    ACTIVE_STATES.contains(&state)
}

/// A parsed row of a socket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    /// Decoded remote address; `None` when the hex form could not be decoded.
    pub remote: Option<IpAddr>,
    pub remote_port: u16,
    pub state: u8,
}

/// Decodes an 8 character IPv4 word.
pub fn decode_ipv4(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let word = u32::from_str_radix(hex, 16).ok()?;
    // the kernel printed the word in host order
    Some(Ipv4Addr::from(word.to_ne_bytes()))
}

/// Decodes a 32 character IPv6 address made of four host-order words.
pub fn decode_ipv6(hex: &str) -> Option<Ipv6Addr> {
    if hex.len() != 32 || !hex.is_ascii() {
        return None;
    }
    let mut octets = [0u8; 16];
    for (chunk, out) in octets.chunks_exact_mut(4).enumerate() {
        let start = chunk * 8;
        let word = u32::from_str_radix(&hex[start..start + 8], 16).ok()?;
        out.copy_from_slice(&word.to_ne_bytes());
    }
    Some(Ipv6Addr::from(octets))
}

fn decode_address(hex: &str, version: IpVersion) -> Option<IpAddr> {
    match version {
        IpVersion::V4 => decode_ipv4(hex).map(IpAddr::V4),
        IpVersion::V6 => decode_ipv6(hex).map(IpAddr::V6),
    }
}

/// Parses one table row. Returns `None` for malformed rows.
pub fn parse_row(line: &str, version: IpVersion) -> Option<SocketEntry> {
    let mut fields = line.split_whitespace();
    let _slot = fields.next()?;
    let _local = fields.next()?;
    let remote = fields.next()?;
    let state = u8::from_str_radix(fields.next()?, 16).ok()?;

    let (remote_hex, port_hex) = remote.split_once(':')?;
    let remote_port = u16::from_str_radix(port_hex, 16).ok()?;

    Some(SocketEntry {
        remote: decode_address(remote_hex, version),
        remote_port,
        state,
    })
}

/// Parses a whole table, skipping the header and any malformed rows.
///
/// # Errors
///
/// Returns an error only if reading from `buf` fails.
pub fn parse_table<R: BufRead>(buf: &mut R, version: IpVersion) -> std::io::Result<Vec<SocketEntry>> {
    let mut entries = Vec::new();
    let mut line = String::new();
    buf.read_line(&mut line)?;
    line.clear();

    while buf.read_line(&mut line)? != 0 {
        match parse_row(&line, version) {
            Some(entry) => entries.push(entry),
            None if line.trim().is_empty() => {}
            None => log::trace!("skipping malformed socket row: {}", line.trim_end()),
        }
        line.clear();
    }

    Ok(entries)
}
