use thiserror::Error;

use crate::buffer::{BufferError, ByteBuffer};

const SOCKS_VERSION: u8 = 0x05;

pub const METHOD_NO_AUTH_REQUIRED: u8 = 0x00;
pub const METHOD_USERNAME_PASSWORD: u8 = 0x02;
pub const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

/// States of the incremental hello (client greeting) decoder.
///
/// `{version, nmethods, methods, done, err_version, err}` in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Version,
    NMethods,
    Methods,
    Done,
    ErrVersion,
    Err,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HelloError {
    #[error("unsupported SOCKS version {0:#x}")]
    Version(u8),
}

/// Byte-by-byte decoder for the client's method-offer message
/// (`VER | NMETHODS | METHODS`), tolerant of arbitrary fragmentation.
///
/// The caller supplies an "is a credential configured" flag up front;
/// [`Self::feed`] selects `0x02` the first time it sees that method offered
/// if credentials are configured, else `0x00` the first time it sees
/// no-auth. Unseen leaves the selection at `0xFF` (no acceptable methods).
#[derive(Debug)]
pub struct HelloParser {
    state: State,
    remaining_methods: u16,
    has_credentials: bool,
    selected: u8,
}

impl HelloParser {
    pub fn new(has_credentials: bool) -> Self {
        Self {
            state: State::Version,
            remaining_methods: 0,
            has_credentials,
            selected: METHOD_NO_ACCEPTABLE,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn is_err(&self) -> bool {
        matches!(self.state, State::Err | State::ErrVersion)
    }

    /// The method chosen so far; only meaningful once [`Self::is_done`].
    pub fn selected_method(&self) -> u8 {
        self.selected
    }

    /// Feeds a single byte, advancing the parser's state.
    ///
    /// Feeding further bytes after a terminal state is reached is a no-op
    /// (parser termination property, spec.md §8).
    pub fn feed(&mut self, byte: u8) -> Result<(), HelloError> {
        match self.state {
            State::Version => {
                if byte != SOCKS_VERSION {
                    self.state = State::ErrVersion;
                    return Err(HelloError::Version(byte));
                }
                self.state = State::NMethods;
            }
            State::NMethods => {
                self.remaining_methods = u16::from(byte);
                self.state = if self.remaining_methods == 0 {
                    State::Done
                } else {
                    State::Methods
                };
            }
            State::Methods => {
                self.on_method(byte);
                self.remaining_methods -= 1;
                if self.remaining_methods == 0 {
                    self.state = State::Done;
                }
            }
            State::Done | State::ErrVersion | State::Err => {}
        }
        Ok(())
    }

    fn on_method(&mut self, method: u8) {
        if self.has_credentials {
            if method == METHOD_USERNAME_PASSWORD && self.selected == METHOD_NO_ACCEPTABLE {
                self.selected = METHOD_USERNAME_PASSWORD;
            }
        } else if method == METHOD_NO_AUTH_REQUIRED && self.selected == METHOD_NO_ACCEPTABLE {
            self.selected = METHOD_NO_AUTH_REQUIRED;
        }
    }
}

/// Marshals the server's method-choice reply (`VER | METHOD`).
pub fn marshal_choice(buf: &mut ByteBuffer, selected_method: u8) -> Result<(), BufferError> {
    buf.write_all(&[SOCKS_VERSION, selected_method])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut HelloParser, bytes: &[u8]) {
        for &b in bytes {
            parser.feed(b).unwrap();
        }
    }

    #[test]
    fn selects_no_auth_when_no_credentials_configured() {
        let mut parser = HelloParser::new(false);
        feed_all(&mut parser, &[0x05, 0x02, 0x00, 0x02]);
        assert!(parser.is_done());
        assert_eq!(parser.selected_method(), METHOD_NO_AUTH_REQUIRED);
    }

    #[test]
    fn selects_username_password_when_credentials_configured() {
        let mut parser = HelloParser::new(true);
        feed_all(&mut parser, &[0x05, 0x02, 0x00, 0x02]);
        assert!(parser.is_done());
        assert_eq!(parser.selected_method(), METHOD_USERNAME_PASSWORD);
    }

    #[test]
    fn no_acceptable_method_when_offer_does_not_match() {
        let mut parser = HelloParser::new(true);
        feed_all(&mut parser, &[0x05, 0x01, 0x00]);
        assert!(parser.is_done());
        assert_eq!(parser.selected_method(), METHOD_NO_ACCEPTABLE);
    }

    #[test]
    fn rejects_bad_version() {
        let mut parser = HelloParser::new(false);
        let err = parser.feed(0x04).unwrap_err();
        assert_eq!(err, HelloError::Version(0x04));
        assert!(parser.is_err());
    }

    #[test]
    fn fragmentation_invariance() {
        let message = [0x05, 0x02, 0x00, 0x02];
        let mut whole = HelloParser::new(true);
        feed_all(&mut whole, &message);

        // Same message fed one byte at a time with pauses in between.
        let mut fragmented = HelloParser::new(true);
        for &b in &message {
            fragmented.feed(b).unwrap();
        }

        assert_eq!(whole.selected_method(), fragmented.selected_method());
        assert_eq!(whole.is_done(), fragmented.is_done());
    }

    #[test]
    fn terminal_state_ignores_further_bytes() {
        let mut parser = HelloParser::new(false);
        feed_all(&mut parser, &[0x05, 0x01, 0x00]);
        assert!(parser.is_done());
        let before = parser.selected_method();
        parser.feed(0xAA).unwrap();
        assert_eq!(parser.selected_method(), before);
    }
}
