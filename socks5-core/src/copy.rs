use socks5_proto::ByteBuffer;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::metrics::Metrics;

/// Bytes moved in each direction once the tunnel drains (spec.md §4.10,
/// §8 "Copy conservation").
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CopyStats {
    pub client_to_origin: u64,
    pub origin_to_client: u64,
}

/// Pumps bytes from `reader` to `writer` until EOF or error, then shuts
/// down `writer`'s write half — the half-close half of spec.md §4.10's
/// read/write handlers ("shutdown peer fd for writing, clear WRITE from
/// peer's duplex").
///
/// `scratch` is the connection's `read_buf` or `write_buf`: this is the
/// same fixed-capacity buffer the handshake parsers fed from, now reused
/// as the copy-phase relay buffer per spec.md §3 ("the two buffers are
/// reused across all phases"). Whatever is still readable in `scratch` when
/// this is called — e.g. client payload bytes pipelined into the same
/// segment as the CONNECT request, left unconsumed by the request parser —
/// is forwarded before the first fresh read, so the tunnel never drops
/// bytes the handshake already buffered.
async fn pump<R, W>(mut reader: R, mut writer: W, scratch: &mut ByteBuffer, on_recv: impl Fn(u64)) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;

    if scratch.can_read() {
        let n = scratch.readable() as u64;
        if writer.write_all(scratch.read_slice()).await.is_err() {
            let _ = writer.shutdown().await;
            return total;
        }
        total += n;
        on_recv(n);
    }

    loop {
        scratch.reset();
        let n = match reader.read(scratch.write_slice()).await {
            Ok(n) => n,
            Err(_) => 0, // treat a recv error the same as EOF: half-close this direction.
        };
        if n == 0 {
            // peer EOF or recv error: shut this direction down, the other may continue.
            let _ = writer.shutdown().await;
            return total;
        }
        scratch.write_advance(n);
        if writer.write_all(scratch.read_slice()).await.is_err() {
            // send failed: shut this direction down too, peer keeps flowing independently.
            let _ = writer.shutdown().await;
            return total;
        }
        total += n as u64;
        on_recv(n as u64);
    }
}

/// Runs the bidirectional tunnel: client half reads into `read_buf`/writes
/// from `write_buf`, origin half is the mirror image (spec.md §4.10). Ends
/// once both halves report `NOOP` — i.e. once both `pump` futures complete,
/// which for a plain duplicated stream happens when both directions have
/// seen EOF or hit an error.
pub(crate) async fn run_copy<CR, CW, OR, OW>(
    client_read: CR,
    client_write: CW,
    origin_read: OR,
    origin_write: OW,
    read_buf: &mut ByteBuffer,
    write_buf: &mut ByteBuffer,
    metrics: &Metrics,
) -> CopyStats
where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    OR: AsyncRead + Unpin,
    OW: AsyncWrite + Unpin,
{
    let client_to_origin = pump(client_read, origin_write, read_buf, |n| metrics.add_from_client(n));
    let origin_to_client = pump(origin_read, client_write, write_buf, |n| metrics.add_from_origin(n));

    let (client_to_origin, origin_to_client) = tokio::join!(client_to_origin, origin_to_client);

    metrics.add_to_origin(client_to_origin);
    metrics.add_to_client(origin_to_client);

    CopyStats {
        client_to_origin,
        origin_to_client,
    }
}
