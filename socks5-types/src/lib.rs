//! Address and command types shared between the SOCKS5 wire codec
//! (`socks5-proto`) and the connection runtime (`socks5-core`).
//!
//! No I/O lives here — this crate only knows how to name an endpoint.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// SOCKS5 `CMD` field (RFC 1928 §4). Only `Connect` is driven end-to-end by
/// `socks5-core`; `Bind` and `UdpAssociate` are recognized so the server can
/// reply `command not supported` instead of dropping the connection silently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

impl Command {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Command::Connect),
            0x02 => Some(Command::Bind),
            0x03 => Some(Command::UdpAssociate),
            _ => None,
        }
    }
}

/// SOCKS5 `ATYP` field (RFC 1928 §5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AddrKind {
    V4 = 0x01,
    Domain = 0x03,
    V6 = 0x04,
}

impl AddrKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(AddrKind::V4),
            0x03 => Some(AddrKind::Domain),
            0x04 => Some(AddrKind::V6),
            _ => None,
        }
    }
}

/// A destination named either by a resolved socket address or by a domain
/// name awaiting resolution. This is also used for bound (reply) addresses,
/// matching the teacher's `BoundAddr = DestAddr` alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestAddr {
    Ip(SocketAddr),
    Domain(String, u16),
}

/// Bound address used in a SOCKS5 reply.
pub type BoundAddr = DestAddr;

impl DestAddr {
    pub fn port(&self) -> u16 {
        match self {
            DestAddr::Ip(addr) => addr.port(),
            DestAddr::Domain(_, port) => *port,
        }
    }

    pub fn as_ip(&self) -> Option<SocketAddr> {
        match self {
            DestAddr::Ip(addr) => Some(*addr),
            DestAddr::Domain(..) => None,
        }
    }

    pub fn as_domain(&self) -> Option<(&str, u16)> {
        match self {
            DestAddr::Domain(name, port) => Some((name, *port)),
            DestAddr::Ip(_) => None,
        }
    }

    /// The all-zero IPv4 bound address used in failure replies (spec: domain
    /// is disallowed in replies, fallback to IPv4 zero).
    pub fn unspecified() -> Self {
        DestAddr::Ip(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))
    }
}

impl fmt::Display for DestAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestAddr::Ip(addr) => write!(f, "{addr}"),
            DestAddr::Domain(name, port) => write!(f, "{name}:{port}"),
        }
    }
}

impl From<SocketAddr> for DestAddr {
    fn from(addr: SocketAddr) -> Self {
        DestAddr::Ip(addr)
    }
}

impl From<SocketAddrV4> for DestAddr {
    fn from(addr: SocketAddrV4) -> Self {
        DestAddr::Ip(SocketAddr::V4(addr))
    }
}

impl From<SocketAddrV6> for DestAddr {
    fn from(addr: SocketAddrV6) -> Self {
        DestAddr::Ip(SocketAddr::V6(addr))
    }
}

/// A fully decoded SOCKS5 request (`CMD | RSV | ATYP | DST.ADDR | DST.PORT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub cmd: Command,
    pub addr: DestAddr,
}

impl Request {
    pub fn atyp(&self) -> AddrKind {
        match &self.addr {
            DestAddr::Ip(SocketAddr::V4(_)) => AddrKind::V4,
            DestAddr::Ip(SocketAddr::V6(_)) => AddrKind::V6,
            DestAddr::Domain(..) => AddrKind::Domain,
        }
    }
}

/// SOCKS5 reply codes (RFC 1928 §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    NotAllowedByRuleset = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TtlExpired = 0x06,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

impl ReplyCode {
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ReplyCode::Succeeded => "succeeded",
            ReplyCode::GeneralFailure => "general SOCKS server failure",
            ReplyCode::NotAllowedByRuleset => "connection not allowed by ruleset",
            ReplyCode::NetworkUnreachable => "network unreachable",
            ReplyCode::HostUnreachable => "host unreachable",
            ReplyCode::ConnectionRefused => "connection refused",
            ReplyCode::TtlExpired => "TTL expired",
            ReplyCode::CommandNotSupported => "command not supported",
            ReplyCode::AddressTypeNotSupported => "address type not supported",
        };
        f.write_str(msg)
    }
}

/// Maps a `connect()` failure to the SOCKS5 reply code the client should see.
///
/// `errno_to_socks` in spec.md §4.4.
pub fn io_error_to_reply(err: &std::io::Error) -> ReplyCode {
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
        std::io::ErrorKind::TimedOut => ReplyCode::TtlExpired,
        #[cfg(target_os = "linux")]
        _ if err.raw_os_error() == Some(libc_enetunreach()) => ReplyCode::NetworkUnreachable,
        #[cfg(target_os = "linux")]
        _ if err.raw_os_error() == Some(libc_ehostunreach()) => ReplyCode::HostUnreachable,
        _ => ReplyCode::GeneralFailure,
    }
}

#[cfg(target_os = "linux")]
fn libc_enetunreach() -> i32 {
    101 // ENETUNREACH
}

#[cfg(target_os = "linux")]
fn libc_ehostunreach() -> i32 {
    113 // EHOSTUNREACH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_is_ipv4_zero() {
        assert_eq!(DestAddr::unspecified(), DestAddr::Ip("0.0.0.0:0".parse().unwrap()));
    }

    #[test]
    fn request_atyp_matches_address_variant() {
        let req = Request {
            cmd: Command::Connect,
            addr: DestAddr::Domain("example.com".into(), 80),
        };
        assert_eq!(req.atyp(), AddrKind::Domain);
    }
}
