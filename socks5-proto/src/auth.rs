use thiserror::Error;

use crate::buffer::{BufferError, ByteBuffer};

const NEGOTIATION_VERSION: u8 = 0x01;

pub const STATUS_SUCCESS: u8 = 0x00;
pub const STATUS_FAILURE: u8 = 0x01;

/// States of the incremental username/password sub-negotiation decoder
/// (RFC 1929). `{version, ulen, uname, plen, passwd, done, err_version,
/// err}` in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Version,
    ULen,
    UName,
    PLen,
    Passwd,
    Done,
    ErrVersion,
    Err,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("unsupported sub-negotiation version {0:#x}")]
    Version(u8),
    #[error("empty username is not allowed")]
    EmptyUsername,
}

/// Byte-by-byte decoder for `VER | ULEN | UNAME | PLEN | PASSWD`.
///
/// Invariant: a zero-length username is rejected at the `ulen` step (empty
/// password is legal).
#[derive(Debug)]
pub struct AuthParser {
    state: State,
    remaining: usize,
    username: Vec<u8>,
    password: Vec<u8>,
}

impl Default for AuthParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthParser {
    pub fn new() -> Self {
        Self {
            state: State::Version,
            remaining: 0,
            username: Vec::new(),
            password: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn is_err(&self) -> bool {
        matches!(self.state, State::Err | State::ErrVersion)
    }

    pub fn username(&self) -> &[u8] {
        &self.username
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }

    pub fn feed(&mut self, byte: u8) -> Result<(), AuthError> {
        match self.state {
            State::Version => {
                if byte != NEGOTIATION_VERSION {
                    self.state = State::ErrVersion;
                    return Err(AuthError::Version(byte));
                }
                self.state = State::ULen;
            }
            State::ULen => {
                if byte == 0 {
                    self.state = State::Err;
                    return Err(AuthError::EmptyUsername);
                }
                self.remaining = usize::from(byte);
                self.username.reserve(self.remaining);
                self.state = State::UName;
            }
            State::UName => {
                self.username.push(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.state = State::PLen;
                }
            }
            State::PLen => {
                self.remaining = usize::from(byte);
                self.password.reserve(self.remaining);
                self.state = if self.remaining == 0 { State::Done } else { State::Passwd };
            }
            State::Passwd => {
                self.password.push(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.state = State::Done;
                }
            }
            State::Done | State::ErrVersion | State::Err => {}
        }
        Ok(())
    }
}

/// Marshals the sub-negotiation status reply (`VER | STATUS`).
pub fn marshal_status(buf: &mut ByteBuffer, status: u8) -> Result<(), BufferError> {
    buf.write_all(&[NEGOTIATION_VERSION, status])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut AuthParser, bytes: &[u8]) -> Result<(), AuthError> {
        for &b in bytes {
            parser.feed(b)?;
        }
        Ok(())
    }

    fn message(user: &str, pass: &str) -> Vec<u8> {
        let mut m = vec![0x01, user.len() as u8];
        m.extend_from_slice(user.as_bytes());
        m.push(pass.len() as u8);
        m.extend_from_slice(pass.as_bytes());
        m
    }

    #[test]
    fn decodes_username_and_password() {
        let mut parser = AuthParser::new();
        feed_all(&mut parser, &message("alice", "s3cret")).unwrap();
        assert!(parser.is_done());
        assert_eq!(parser.username(), b"alice");
        assert_eq!(parser.password(), b"s3cret");
    }

    #[test]
    fn empty_password_is_legal() {
        let mut parser = AuthParser::new();
        feed_all(&mut parser, &message("alice", "")).unwrap();
        assert!(parser.is_done());
        assert_eq!(parser.password(), b"");
    }

    #[test]
    fn empty_username_is_rejected() {
        let mut parser = AuthParser::new();
        let err = feed_all(&mut parser, &[0x01, 0x00]).unwrap_err();
        assert_eq!(err, AuthError::EmptyUsername);
        assert!(parser.is_err());
    }

    #[test]
    fn fragmentation_invariance() {
        let msg = message("bob", "hunter2");
        let mut whole = AuthParser::new();
        feed_all(&mut whole, &msg).unwrap();

        let mut fragmented = AuthParser::new();
        for chunk in msg.chunks(1) {
            feed_all(&mut fragmented, chunk).unwrap();
        }

        assert_eq!(whole.username(), fragmented.username());
        assert_eq!(whole.password(), fragmented.password());
        assert_eq!(whole.is_done(), fragmented.is_done());
    }

    #[test]
    fn terminal_state_ignores_further_bytes() {
        let mut parser = AuthParser::new();
        feed_all(&mut parser, &message("a", "b")).unwrap();
        parser.feed(0x99).unwrap();
        assert_eq!(parser.username(), b"a");
        assert_eq!(parser.password(), b"b");
    }
}
