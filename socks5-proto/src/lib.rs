//! Incremental, fragmentation-tolerant decoders for the three SOCKS5
//! handshake messages (hello, username/password auth, CONNECT request),
//! their marshalling counterparts, and the fixed-capacity [`ByteBuffer`]
//! they're fed from.
//!
//! Every parser here is a pure byte-at-a-time state machine: no I/O, no
//! allocation beyond the per-message scratch it needs. This is what lets
//! `socks5-core` drive them from whatever async read loop it likes while
//! keeping the fragmentation-invariance property testable in isolation.

mod auth;
mod buffer;
mod hello;
mod request;

pub use auth::{marshal_status, AuthError, AuthParser, STATUS_FAILURE, STATUS_SUCCESS};
pub use buffer::{BufferError, ByteBuffer};
pub use hello::{marshal_choice, HelloError, HelloParser, METHOD_NO_ACCEPTABLE, METHOD_NO_AUTH_REQUIRED, METHOD_USERNAME_PASSWORD};
pub use request::{marshal_reply, RequestError, RequestParser};
