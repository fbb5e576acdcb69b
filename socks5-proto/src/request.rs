use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use socks5_types::{AddrKind, Command, DestAddr, Request};
use thiserror::Error;

use crate::buffer::{BufferError, ByteBuffer};

const SOCKS_VERSION: u8 = 0x05;
const ADDR_MAX_LEN: usize = 260;

/// States of the incremental CONNECT-request decoder. `{version, cmd, rsv,
/// atyp, dstaddr_fqdn_len, dstaddr, dstport, done, err_version, err_atyp,
/// err_cmd, err}` in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Version,
    Cmd,
    Rsv,
    Atyp,
    FqdnLen,
    Addr,
    Port,
    Done,
    ErrVersion,
    ErrAtyp,
    ErrCmd,
    Err,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("unsupported SOCKS version {0:#x}")]
    Version(u8),
    #[error("unsupported command {0:#x}")]
    Command(u8),
    #[error("unsupported address type {0:#x}")]
    AddrType(u8),
    #[error("reserved byte must be zero, got {0:#x}")]
    BadReserved(u8),
    #[error("domain name is not valid UTF-8")]
    BadDomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Addr {
    V4([u8; 4]),
    V6([u8; 16]),
    Domain,
}

/// Byte-by-byte decoder for `VER | CMD | RSV | ATYP | DST.ADDR | DST.PORT`.
///
/// Only `CONNECT` is accepted without error by [`Self::feed`]'s own logic;
/// callers that want to *reply* rather than abort on `Bind`/`UdpAssociate`
/// should inspect [`Self::command_error`] instead of only checking
/// [`Self::is_err`] (spec.md §7: unsupported command/atyp detected here
/// still gets a SOCKS reply, not a silent close).
#[derive(Debug)]
pub struct RequestParser {
    state: State,
    remaining: usize,
    index: usize,
    cmd: Option<Command>,
    addr: Addr,
    domain: Vec<u8>,
    port: [u8; 2],
    last_error: Option<RequestError>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: State::Version,
            remaining: 0,
            index: 0,
            cmd: None,
            addr: Addr::V4([0; 4]),
            domain: Vec::new(),
            port: [0; 2],
            last_error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn is_err(&self) -> bool {
        matches!(self.state, State::Err | State::ErrVersion | State::ErrAtyp | State::ErrCmd)
    }

    /// Set when the parser reached the request step but the command or
    /// address type is unsupported. These get a SOCKS reply rather than a
    /// silent close, unlike version/format errors.
    pub fn command_error(&self) -> Option<&RequestError> {
        self.last_error.as_ref()
    }

    pub fn feed(&mut self, byte: u8) -> Result<(), RequestError> {
        match self.state {
            State::Version => {
                if byte != SOCKS_VERSION {
                    self.state = State::ErrVersion;
                    let err = RequestError::Version(byte);
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
                self.state = State::Cmd;
            }
            State::Cmd => match Command::from_u8(byte) {
                Some(cmd) => {
                    self.cmd = Some(cmd);
                    self.state = State::Rsv;
                }
                None => {
                    self.state = State::ErrCmd;
                    let err = RequestError::Command(byte);
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
            },
            State::Rsv => {
                if byte != 0x00 {
                    self.state = State::Err;
                    let err = RequestError::BadReserved(byte);
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
                self.state = State::Atyp;
            }
            State::Atyp => match AddrKind::from_u8(byte) {
                Some(AddrKind::V4) => {
                    self.addr = Addr::V4([0; 4]);
                    self.index = 0;
                    self.remaining = 4;
                    self.state = State::Addr;
                }
                Some(AddrKind::V6) => {
                    self.addr = Addr::V6([0; 16]);
                    self.index = 0;
                    self.remaining = 16;
                    self.state = State::Addr;
                }
                Some(AddrKind::Domain) => {
                    self.addr = Addr::Domain;
                    self.state = State::FqdnLen;
                }
                None => {
                    self.state = State::ErrAtyp;
                    let err = RequestError::AddrType(byte);
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
            },
            State::FqdnLen => {
                self.remaining = usize::from(byte);
                self.domain.clear();
                self.domain.reserve(self.remaining);
                self.state = if self.remaining == 0 { State::Port } else { State::Addr };
                self.index = 0;
            }
            State::Addr => {
                match self.addr {
                    Addr::V4(ref mut bytes) => {
                        bytes[self.index] = byte;
                    }
                    Addr::V6(ref mut bytes) => {
                        bytes[self.index] = byte;
                    }
                    Addr::Domain => {
                        self.domain.push(byte);
                    }
                }
                self.index += 1;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.state = State::Port;
                    self.index = 0;
                }
            }
            State::Port => {
                self.port[self.index] = byte;
                self.index += 1;
                if self.index == 2 {
                    self.state = State::Done;
                }
            }
            State::Done | State::ErrVersion | State::ErrAtyp | State::ErrCmd | State::Err => {}
        }
        Ok(())
    }

    /// The decoded request; only meaningful once [`Self::is_done`].
    pub fn finish(&self) -> Request {
        let port = u16::from_be_bytes(self.port);
        let addr = match self.addr {
            Addr::V4(bytes) => DestAddr::Ip(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(bytes), port))),
            Addr::V6(bytes) => DestAddr::Ip(SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(bytes), port, 0, 0))),
            Addr::Domain => {
                let name = String::from_utf8_lossy(&self.domain).into_owned();
                DestAddr::Domain(name, port)
            }
        };
        Request {
            cmd: self.cmd.expect("command set before request is done"),
            addr,
        }
    }
}

/// Marshals a SOCKS5 reply (`VER | REP | RSV | ATYP | BND.ADDR | BND.PORT`).
///
/// Domain names are disallowed in replies; callers must pass an IPv4/IPv6
/// bound address (falls back to IPv4 zero for a domain, per spec.md §4.4).
pub fn marshal_reply(buf: &mut ByteBuffer, status: u8, bound: &DestAddr) -> Result<(), BufferError> {
    let mut packet = [0u8; ADDR_MAX_LEN + 3];
    packet[0] = SOCKS_VERSION;
    packet[1] = status;
    packet[2] = 0x00;

    let addr_len = match bound {
        DestAddr::Ip(SocketAddr::V4(addr)) => {
            packet[3] = AddrKind::V4 as u8;
            packet[4..8].copy_from_slice(&addr.ip().octets());
            packet[8..10].copy_from_slice(&addr.port().to_be_bytes());
            4 + 1 + 2
        }
        DestAddr::Ip(SocketAddr::V6(addr)) => {
            packet[3] = AddrKind::V6 as u8;
            packet[4..20].copy_from_slice(&addr.ip().octets());
            packet[20..22].copy_from_slice(&addr.port().to_be_bytes());
            16 + 1 + 2
        }
        DestAddr::Domain(..) => {
            // domain disallowed in replies; fall back to an all-zero IPv4 bound addr
            return marshal_reply(buf, status, &DestAddr::unspecified());
        }
    };

    buf.write_all(&packet[..3 + addr_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut RequestParser, bytes: &[u8]) -> Result<(), RequestError> {
        for &b in bytes {
            parser.feed(b)?;
        }
        Ok(())
    }

    #[test]
    fn decodes_ipv4_connect() {
        let mut parser = RequestParser::new();
        feed_all(&mut parser, &[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50]).unwrap();
        assert!(parser.is_done());
        let req = parser.finish();
        assert_eq!(req.cmd, Command::Connect);
        assert_eq!(req.addr, DestAddr::Ip("127.0.0.1:80".parse().unwrap()));
    }

    #[test]
    fn decodes_domain() {
        let mut parser = RequestParser::new();
        let mut msg = vec![0x05, 0x01, 0x00, 0x03, 11u8];
        msg.extend_from_slice(b"example.tld");
        msg.extend_from_slice(&80u16.to_be_bytes());
        feed_all(&mut parser, &msg).unwrap();
        assert!(parser.is_done());
        let req = parser.finish();
        assert_eq!(req.addr, DestAddr::Domain("example.tld".into(), 80));
    }

    #[test]
    fn decodes_ipv6() {
        let mut parser = RequestParser::new();
        let mut msg = vec![0x05, 0x01, 0x00, 0x04];
        msg.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        msg.extend_from_slice(&443u16.to_be_bytes());
        feed_all(&mut parser, &msg).unwrap();
        let req = parser.finish();
        assert_eq!(req.addr, DestAddr::Ip(SocketAddr::new(Ipv6Addr::LOCALHOST.into(), 443)));
    }

    #[test]
    fn unsupported_command_is_recoverable_for_reply() {
        let mut parser = RequestParser::new();
        let err = feed_all(&mut parser, &[0x05, 0x02]).unwrap_err();
        assert_eq!(err, RequestError::Command(0x02));
        assert_eq!(parser.command_error(), Some(&RequestError::Command(0x02)));
    }

    #[test]
    fn fragmentation_invariance() {
        let msg = [0x05, 0x01, 0x00, 0x01, 10, 0, 0, 1, 0x1F, 0x90];
        let mut whole = RequestParser::new();
        feed_all(&mut whole, &msg).unwrap();

        let mut fragmented = RequestParser::new();
        for chunk in msg.chunks(1) {
            feed_all(&mut fragmented, chunk).unwrap();
        }

        assert_eq!(whole.finish(), fragmented.finish());
    }

    #[test]
    fn marshal_parse_round_trip_ipv4() {
        let mut buf = ByteBuffer::new(32);
        let bound = DestAddr::Ip("203.0.113.9:8080".parse().unwrap());
        marshal_reply(&mut buf, 0x00, &bound).unwrap();

        // Parse it back like a client-side reply reader would.
        let bytes = buf.read_slice();
        assert_eq!(bytes[0], SOCKS_VERSION);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(bytes[3], AddrKind::V4 as u8);
        let ip = Ipv4Addr::new(bytes[4], bytes[5], bytes[6], bytes[7]);
        let port = u16::from_be_bytes([bytes[8], bytes[9]]);
        assert_eq!(DestAddr::from(SocketAddrV4::new(ip, port)), bound);
    }

    #[test]
    fn marshal_parse_round_trip_ipv6() {
        let mut buf = ByteBuffer::new(32);
        let bound = DestAddr::Ip(SocketAddr::new(Ipv6Addr::LOCALHOST.into(), 9001));
        marshal_reply(&mut buf, 0x00, &bound).unwrap();

        let bytes = buf.read_slice();
        assert_eq!(bytes[3], AddrKind::V6 as u8);
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&bytes[4..20]);
        let port = u16::from_be_bytes([bytes[20], bytes[21]]);
        assert_eq!(
            DestAddr::from(SocketAddrV6::new(Ipv6Addr::from(octets), port, 0, 0)),
            bound
        );
    }
}
