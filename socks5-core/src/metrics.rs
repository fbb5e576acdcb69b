use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters (spec.md §4.9). Written by connection tasks,
/// read by whatever external management surface exposes them — out of
/// scope here, but the counters themselves are part of the ambient stack
/// and are carried regardless (spec.md §6).
///
/// Grounded on `jmux-proxy`'s use of `AtomicU64` for lock-free shared
/// counters between concurrently running connection tasks.
#[derive(Debug, Default)]
pub struct Metrics {
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
    pub connections_current: AtomicU64,
    pub auth_success: AtomicU64,
    pub auth_failed: AtomicU64,
    pub connect_success: AtomicU64,
    pub connect_failed: AtomicU64,
    pub bytes_from_client: AtomicU64,
    pub bytes_to_client: AtomicU64,
    pub bytes_from_origin: AtomicU64,
    pub bytes_to_origin: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.connections_current.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        self.connections_current.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn auth_result(&self, success: bool) {
        if success {
            self.auth_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.auth_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn connect_result(&self, success: bool) {
        if success {
            self.connect_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connect_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_from_client(&self, n: u64) {
        self.bytes_from_client.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_to_client(&self, n: u64) {
        self.bytes_to_client.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_from_origin(&self, n: u64) {
        self.bytes_from_origin.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_to_origin(&self, n: u64) {
        self.bytes_to_origin.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_close_balance_current_count() {
        let metrics = Metrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();
        assert_eq!(metrics.connections_current.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.connections_opened.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.connections_closed.load(Ordering::Relaxed), 1);
    }
}
