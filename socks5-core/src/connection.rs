use std::time::Instant;

use socks5_proto::ByteBuffer;

/// `last_status` has no defined SOCKS meaning until the reply step is
/// reached; the access log renders it as `UNKNOWN` (spec.md §9 open
/// question, preserved as-is).
pub(crate) const STATUS_UNKNOWN: u8 = 0xFF;

/// Per-connection aggregate (spec.md §3 Connection State).
///
/// Reused across connections via [`crate::pool::ConnectionPool`] to amortize
/// allocation; the two buffers are the only sizable allocation it owns; the
/// resolved-address list produced during `REQUEST_RESOLVING` is scoped to
/// the flow controller's stack rather than stored here, since under tokio
/// there is no cross-thread "write-once cell" to model — the resolving
/// future is simply `.await`ed in place.
pub struct ConnectionState {
    /// Client → origin bytes in flight during the copy phase; also used as
    /// general-purpose read scratch for the handshake parsers.
    pub read_buf: ByteBuffer,
    /// Origin → client bytes in flight during the copy phase; also used to
    /// marshal handshake replies before they're sent to the client.
    pub write_buf: ByteBuffer,
    pub username: Option<String>,
    pub start: Instant,
    pub last_status: u8,
    pub destination: Option<String>,
    pub dest_port: u16,
    pub bytes_to_origin: u64,
    pub bytes_from_origin: u64,
}

impl ConnectionState {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            read_buf: ByteBuffer::new(buffer_size),
            write_buf: ByteBuffer::new(buffer_size),
            username: None,
            start: Instant::now(),
            last_status: STATUS_UNKNOWN,
            destination: None,
            dest_port: 0,
            bytes_to_origin: 0,
            bytes_from_origin: 0,
        }
    }

    /// Restores the aggregate to its just-allocated shape before handing it
    /// back out of the pool.
    pub fn reset(&mut self) {
        self.read_buf.reset();
        self.write_buf.reset();
        self.username = None;
        self.start = Instant::now();
        self.last_status = STATUS_UNKNOWN;
        self.destination = None;
        self.dest_port = 0;
        self.bytes_to_origin = 0;
        self.bytes_from_origin = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_unknown_status_and_empty_buffers() {
        let mut conn = ConnectionState::new(64);
        conn.read_buf.write_all(b"abc").unwrap();
        conn.last_status = 0x00;
        conn.bytes_to_origin = 100;
        conn.username = Some("alice".into());

        conn.reset();

        assert_eq!(conn.last_status, STATUS_UNKNOWN);
        assert_eq!(conn.bytes_to_origin, 0);
        assert!(conn.username.is_none());
        assert!(!conn.read_buf.can_read());
    }
}
