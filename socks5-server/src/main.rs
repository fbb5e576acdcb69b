use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use socks5_core::config::{ServerConfig, UserTable};
use socks5_core::ServerContext;

mod logging;

const USAGE: &str = "[--config <PATH>] [--listen <ADDR:PORT>] [--no-auth-required] [--user <USERNAME>,<PASSWORD>] [--backlog <N>] [--pool-capacity <N>] [--log-file <PATH>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let raw: Vec<String> = std::env::args().collect();
    let raw: Vec<&str> = raw.iter().skip(1).map(String::as_str).collect();
    let args = parse_args(&raw)?;

    if args.show_usage {
        let prgm_name = std::env::args().next().unwrap();
        println!("Usage: {} {}", prgm_name, USAGE);
        return Ok(());
    }

    let config = build_config(args)?;
    let _logger_guard = logging::init(config.log_file.as_deref()).context("failed to initialize logging")?;
    tracing::info!(listen_addr = %config.listen_addr, backlog = config.backlog, "starting socks5-server");

    let ctx = ServerContext::new(config);
    socks5_core::run_listener(ctx, shutdown_signal()).await?;

    tracing::info!("socks5-server stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = terminate.recv() => tracing::info!("received SIGTERM"),
        _ = interrupt.recv() => tracing::info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received ctrl-c");
}

#[derive(Debug, Default)]
struct Args {
    config_path: Option<PathBuf>,
    listen_addr: Option<SocketAddr>,
    no_auth_required: Option<bool>,
    users: Vec<(String, String)>,
    backlog: Option<u32>,
    pool_capacity: Option<usize>,
    buffer_size: Option<usize>,
    log_file: Option<PathBuf>,
    show_usage: bool,
}

fn parse_args(mut input: &[&str]) -> anyhow::Result<Args> {
    let mut args = Args::default();

    loop {
        match input {
            ["--config" | "-c", value, rest @ ..] => {
                args.config_path = Some(PathBuf::from(value));
                input = rest;
            }
            ["--listen" | "-l", value, rest @ ..] => {
                args.listen_addr = Some(value.parse().with_context(|| format!("listen address malformed: {value}"))?);
                input = rest;
            }
            ["--no-auth-required", rest @ ..] => {
                args.no_auth_required = Some(true);
                input = rest;
            }
            ["--user" | "-u", value, rest @ ..] => {
                let idx = value
                    .find(',')
                    .ok_or_else(|| anyhow::anyhow!("malformed username,password: {value}"))?;
                let (user, pass) = value.split_at(idx);
                args.users.push((user.to_owned(), pass[1..].to_owned()));
                input = rest;
            }
            ["--backlog", value, rest @ ..] => {
                args.backlog = Some(value.parse().with_context(|| format!("backlog value malformed: {value}"))?);
                input = rest;
            }
            ["--pool-capacity", value, rest @ ..] => {
                args.pool_capacity = Some(value.parse().with_context(|| format!("pool-capacity value malformed: {value}"))?);
                input = rest;
            }
            ["--buffer-size", value, rest @ ..] => {
                args.buffer_size = Some(value.parse().with_context(|| format!("buffer-size value malformed: {value}"))?);
                input = rest;
            }
            ["--log-file", value, rest @ ..] => {
                args.log_file = Some(PathBuf::from(value));
                input = rest;
            }
            ["--help" | "-h", rest @ ..] => {
                args.show_usage = true;
                input = rest;
            }
            [unexpected_arg, ..] => anyhow::bail!("unexpected argument: {unexpected_arg}"),
            [] => break,
        }
    }

    Ok(args)
}

/// Loads a config file if one was given, then applies command-line overrides
/// on top. CLI flags always win, matching the teacher's own convention of
/// layering: a file for the defaults, flags for what changes at launch.
fn build_config(args: Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config_path {
        Some(path) => ServerConfig::load(path).with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServerConfig::new(),
    };

    if let Some(addr) = args.listen_addr {
        config.listen_addr = addr;
    }
    if let Some(no_auth) = args.no_auth_required {
        config.no_auth_required = no_auth;
    }
    if !args.users.is_empty() {
        config.users = UserTable::new(args.users);
        config.no_auth_required = false;
    }
    if let Some(backlog) = args.backlog {
        config.backlog = backlog;
    }
    if let Some(pool_capacity) = args.pool_capacity {
        config.pool_capacity = pool_capacity;
    }
    if let Some(buffer_size) = args.buffer_size {
        config.buffer_size = buffer_size;
    }
    if let Some(log_file) = args.log_file {
        config.log_file = Some(log_file);
    }

    if !config.no_auth_required && config.users.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "password auth required but no users configured: pass --user or --no-auth-required",
        )
        .into());
    }

    Ok(config)
}
