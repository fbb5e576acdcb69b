use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use socks5_proto::{
    marshal_choice, marshal_reply, marshal_status, AuthParser, HelloParser, RequestError, RequestParser,
    METHOD_NO_ACCEPTABLE, METHOD_NO_AUTH_REQUIRED, METHOD_USERNAME_PASSWORD, STATUS_FAILURE, STATUS_SUCCESS,
};
use socks5_types::{Command, DestAddr, ReplyCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::connection::ConnectionState;
use crate::copy::run_copy;
use crate::resolver;
use crate::state_machine::{StateHooks, StateMachine};
use crate::ServerContext;

/// The ten states of spec.md §4.6, including the two terminals. Under tokio
/// these are driven by a single `async` function rather than separate
/// `handler_read`/`handler_write`/`handler_block` callbacks invoked by an
/// event loop, but the state set and the transitions between them are
/// unchanged — see SPEC_FULL.md §5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Socks5State {
    HelloRead,
    HelloWrite,
    AuthRead,
    AuthWrite,
    RequestRead,
    RequestResolving,
    RequestConnecting,
    RequestWrite,
    Copy,
    Done,
    Error,
}

/// Failure modes of [`connect_to_any`], carrying enough detail to pick the
/// right reply code (spec.md §4.6 item 8, §7's connect-error table).
#[derive(Debug, thiserror::Error)]
enum ConnectError {
    #[error("connect failed")]
    Io(#[from] io::Error),
    #[error("no candidate address reachable")]
    NoAddress,
}

impl ConnectError {
    fn to_reply(&self) -> ReplyCode {
        match self {
            ConnectError::Io(e) => socks5_types::io_error_to_reply(e),
            ConnectError::NoAddress => ReplyCode::HostUnreachable,
        }
    }
}

struct FlowHooks {
    peer: SocketAddr,
}

impl StateHooks for FlowHooks {
    type State = Socks5State;

    fn on_arrival(&mut self, state: Socks5State) {
        tracing::trace!(peer = %self.peer, ?state, "socks5 state arrival");
    }

    fn on_departure(&mut self, state: Socks5State) {
        tracing::trace!(peer = %self.peer, ?state, "socks5 state departure");
    }
}

/// Drives one accepted client through the full handshake and, on success,
/// the bidirectional tunnel, then emits the access-log record and releases
/// `conn`'s buffers for reuse.
///
/// Corresponds to spec.md §4.6 (C7) end-to-end, §4.10 (C10) for the tunnel,
/// and §4.11 (tear-down) for the closing log record.
pub(crate) async fn handle_connection(mut client: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>, conn: &mut ConnectionState) {
    ctx.metrics.connection_opened();

    let mut sm = StateMachine::new(FlowHooks { peer: peer_addr }, Socks5State::HelloRead);

    run(&mut client, &ctx, conn, &mut sm).await;

    if conn.destination.is_some() {
        tracing::info!(
            username = conn.username.as_deref().unwrap_or("anonymous"),
            client_addr = %peer_addr,
            destination = conn.destination.as_deref().unwrap_or(""),
            port = conn.dest_port,
            status = conn.last_status,
            bytes_to_origin = conn.bytes_to_origin,
            bytes_from_origin = conn.bytes_from_origin,
            "socks5 connection closed",
        );
    }

    ctx.metrics.connection_closed();
}

async fn run(client: &mut TcpStream, ctx: &Arc<ServerContext>, conn: &mut ConnectionState, sm: &mut StateMachine<FlowHooks>) {
    let has_credentials = ctx.config.requires_password_auth();

    // HELLO_READ / HELLO_WRITE
    let mut hello = HelloParser::new(has_credentials);
    let parsed = feed_from_stream(client, &mut conn.read_buf, |b| hello.feed(b).map(|_| hello.is_done())).await;
    if parsed.is_err() {
        sm.transition_to(Socks5State::Error);
        return;
    }

    sm.transition_to(Socks5State::HelloWrite);
    let selected = hello.selected_method();
    if marshal_choice(&mut conn.write_buf, selected).is_err() || send_buffered(client, &mut conn.write_buf).await.is_err() {
        sm.transition_to(Socks5State::Error);
        return;
    }

    if selected == METHOD_NO_ACCEPTABLE {
        sm.transition_to(Socks5State::Error);
        return;
    }

    if selected == METHOD_USERNAME_PASSWORD {
        sm.transition_to(Socks5State::AuthRead);
        if !auth_step(client, ctx, conn, sm).await {
            return;
        }
    } else {
        debug_assert_eq!(selected, METHOD_NO_AUTH_REQUIRED);
        sm.transition_to(Socks5State::RequestRead);
    }

    request_step(client, ctx, conn, sm).await;
}

/// Runs `AUTH_READ` then `AUTH_WRITE`. Returns `false` if the connection
/// should end right here (parse error or credential mismatch).
async fn auth_step(client: &mut TcpStream, ctx: &Arc<ServerContext>, conn: &mut ConnectionState, sm: &mut StateMachine<FlowHooks>) -> bool {
    let mut auth = AuthParser::new();
    let parsed = feed_from_stream(client, &mut conn.read_buf, |b| auth.feed(b).map(|_| auth.is_done())).await;
    if parsed.is_err() {
        sm.transition_to(Socks5State::Error);
        return false;
    }

    let success = ctx.config.users.check(auth.username(), auth.password());
    ctx.metrics.auth_result(success);
    conn.username = String::from_utf8(auth.username().to_vec()).ok();

    let status = if success { STATUS_SUCCESS } else { STATUS_FAILURE };

    sm.transition_to(Socks5State::AuthWrite);
    if marshal_status(&mut conn.write_buf, status).is_err() || send_buffered(client, &mut conn.write_buf).await.is_err() {
        sm.transition_to(Socks5State::Error);
        return false;
    }

    if !success {
        sm.transition_to(Socks5State::Error);
        return false;
    }

    sm.transition_to(Socks5State::RequestRead);
    true
}

async fn request_step(client: &mut TcpStream, ctx: &Arc<ServerContext>, conn: &mut ConnectionState, sm: &mut StateMachine<FlowHooks>) {
    let mut request = RequestParser::new();
    let parsed = feed_from_stream(client, &mut conn.read_buf, |b| request.feed(b).map(|_| request.is_done())).await;

    let recoverable = match parsed {
        Ok(()) => None,
        Err(_) if request.command_error().is_some() => request.command_error().cloned(),
        Err(_) => {
            // bad version or malformed reserved byte: abrupt close, no reply.
            sm.transition_to(Socks5State::Error);
            return;
        }
    };

    if let Some(err) = recoverable {
        let code = match err {
            RequestError::Command(_) => ReplyCode::CommandNotSupported,
            RequestError::AddrType(_) => ReplyCode::AddressTypeNotSupported,
            _ => ReplyCode::GeneralFailure,
        };
        finish_with_failure(client, ctx, conn, sm, code).await;
        return;
    }

    let req = request.finish();
    if req.cmd != Command::Connect {
        finish_with_failure(client, ctx, conn, sm, ReplyCode::CommandNotSupported).await;
        return;
    }

    let (host_for_log, port) = match &req.addr {
        DestAddr::Ip(addr) => (addr.ip().to_string(), addr.port()),
        DestAddr::Domain(name, port) => (name.clone(), *port),
    };
    conn.destination = Some(host_for_log);
    conn.dest_port = port;

    let addrs = match &req.addr {
        DestAddr::Ip(addr) => vec![*addr],
        DestAddr::Domain(name, port) => {
            sm.transition_to(Socks5State::RequestResolving);
            let addrs = resolver::resolve(name, *port).await.unwrap_or_default();
            if addrs.is_empty() {
                finish_with_failure(client, ctx, conn, sm, ReplyCode::HostUnreachable).await;
                return;
            }
            addrs
        }
    };

    sm.transition_to(Socks5State::RequestConnecting);
    match connect_to_any(&addrs).await {
        Ok((origin, local_addr)) => {
            ctx.metrics.connect_result(true);
            conn.last_status = ReplyCode::Succeeded.to_u8();
            if marshal_reply(&mut conn.write_buf, ReplyCode::Succeeded.to_u8(), &DestAddr::from(local_addr)).is_err() {
                sm.transition_to(Socks5State::Error);
                return;
            }
            sm.transition_to(Socks5State::RequestWrite);
            if send_buffered(client, &mut conn.write_buf).await.is_err() {
                sm.transition_to(Socks5State::Error);
                return;
            }
            sm.transition_to(Socks5State::Copy);
            run_tunnel(client, origin, ctx, conn).await;
            sm.transition_to(Socks5State::Done);
        }
        Err(e) => {
            finish_with_failure(client, ctx, conn, sm, e.to_reply()).await;
        }
    }
}

/// Sends a failure reply and, once it drains, counts the attempt against
/// `connect_failed` — every non-succeeded REQUEST_WRITE drain counts as one
/// failed connection attempt (spec.md §4.9), regardless of which stage of
/// REQUEST processing produced the failure.
async fn finish_with_failure(client: &mut TcpStream, ctx: &Arc<ServerContext>, conn: &mut ConnectionState, sm: &mut StateMachine<FlowHooks>, code: ReplyCode) {
    conn.last_status = code.to_u8();
    if marshal_reply(&mut conn.write_buf, code.to_u8(), &DestAddr::unspecified()).is_err() {
        sm.transition_to(Socks5State::Error);
        return;
    }
    sm.transition_to(Socks5State::RequestWrite);
    if send_buffered(client, &mut conn.write_buf).await.is_err() {
        sm.transition_to(Socks5State::Error);
        return;
    }
    ctx.metrics.connect_result(false);
    sm.transition_to(Socks5State::Done);
}

/// `request_connect` (spec.md §4.6 item 7-8): tries each resolved address in
/// order, returning the first successful connection's stream and the local
/// address the kernel bound for it (used as the reply's `BND.ADDR`).
async fn connect_to_any(addrs: &[SocketAddr]) -> Result<(TcpStream, SocketAddr), ConnectError> {
    let mut last_err: Option<io::Error> = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let local_addr = stream.local_addr()?;
                return Ok((stream, local_addr));
            }
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(ConnectError::Io(e)),
        None => Err(ConnectError::NoAddress),
    }
}

async fn run_tunnel(client: &mut TcpStream, mut origin: TcpStream, ctx: &Arc<ServerContext>, conn: &mut ConnectionState) {
    let (client_read, client_write) = client.split();
    let (origin_read, origin_write) = origin.split();

    let stats = run_copy(
        client_read,
        client_write,
        origin_read,
        origin_write,
        &mut conn.read_buf,
        &mut conn.write_buf,
        &ctx.metrics,
    )
    .await;

    conn.bytes_to_origin = stats.client_to_origin;
    conn.bytes_from_origin = stats.origin_to_client;
}

/// Reads from `stream` into `buf`, feeding each buffered byte to `feed`
/// until it reports completion, compacting and refilling `buf` as needed.
/// This is what makes the parsers' fragmentation tolerance observable end
/// to end: a message that arrives across many short reads is fed one byte
/// at a time exactly as spec.md §8's fragmentation-invariance property
/// requires.
async fn feed_from_stream<E>(stream: &mut TcpStream, buf: &mut socks5_proto::ByteBuffer, mut feed: impl FnMut(u8) -> Result<bool, E>) -> io::Result<()> {
    loop {
        while let Some(byte) = buf.read_byte() {
            match feed(byte) {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(_) => return Err(io::Error::new(io::ErrorKind::InvalidData, "protocol parse error")),
            }
        }
        buf.compact();
        let n = stream.read(buf.write_slice()).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed before message was complete"));
        }
        buf.write_advance(n);
    }
}

async fn send_buffered(client: &mut TcpStream, buf: &mut socks5_proto::ByteBuffer) -> io::Result<()> {
    client.write_all(buf.read_slice()).await?;
    buf.reset();
    Ok(())
}
