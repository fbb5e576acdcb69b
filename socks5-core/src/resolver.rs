use std::io;
use std::net::SocketAddr;

/// Resolves a host name to a list of candidate addresses (spec.md §4.8).
///
/// The teacher's original design offloads resolution to a detached worker
/// thread and wakes the event loop via a block event once a write-once cell
/// is populated, because the reactor thread must never block. Under tokio,
/// `lookup_host` already performs the blocking `getaddrinfo` call on the
/// runtime's blocking thread pool and only suspends the calling task — so
/// the "must not block the event loop" contract is satisfied by construction
/// and no hand-rolled worker/wake plumbing is needed. An empty result (spec:
/// "resolver returns empty list") is reported as `Ok(vec![])`, not an error,
/// so callers can map it to `host unreachable` per spec.md §7.
pub(crate) async fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => Ok(addrs.collect()),
        Err(_) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolving_an_ip_literal_returns_it_unchanged() {
        let addrs = resolve("127.0.0.1", 80).await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:80".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn unresolvable_domain_yields_empty_list_not_error() {
        let addrs = resolve("nosuch.invalid.tld.", 80).await.unwrap();
        assert!(addrs.is_empty());
    }
}
