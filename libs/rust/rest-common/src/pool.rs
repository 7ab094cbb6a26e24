//! Connection lease accounting shared by every call made through one client.
//!
//! The pool bounds in-flight connections by total and per-route capacity.
//! Callers beyond capacity block on a condition variable until a lease is
//! returned or the lease timeout elapses.

use crate::error::TransportError;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Capacity limits of a [`ConnectionPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    /// Maximum leases across all routes
    pub max_total: usize,
    /// Maximum leases for one route
    pub max_per_route: usize,
    /// Wait bound for one lease
    pub lease_timeout: Duration,
}

#[derive(Debug, Default)]
struct PoolState {
    total: usize,
    per_route: HashMap<String, usize>,
}

impl PoolState {
    fn leased_for(&self, route: &str) -> usize {
        self.per_route.get(route).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct Shared {
    limits: PoolLimits,
    state: Mutex<PoolState>,
    released: Condvar,
}

/// Bounded, thread-safe connection lease pool.
///
/// Cloning yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    shared: Arc<Shared>,
}

impl ConnectionPool {
    /// Create an empty pool with the given limits.
    #[must_use]
    pub fn new(limits: PoolLimits) -> Self {
        Self {
            shared: Arc::new(Shared {
                limits,
                state: Mutex::new(PoolState::default()),
                released: Condvar::new(),
            }),
        }
    }

    /// Limits this pool enforces.
    #[must_use]
    pub fn limits(&self) -> PoolLimits {
        self.shared.limits
    }

    /// Lease a connection slot for the route of `url`, blocking while the
    /// pool is at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PoolTimeout`] if no slot frees up within
    /// the lease timeout.
    pub fn acquire(&self, url: &Url) -> Result<Lease, TransportError> {
        let route = route_key(url);
        let limits = self.shared.limits;
        let started = Instant::now();
        let deadline = started + limits.lease_timeout;

        let mut state = self.shared.state.lock();
        while state.total >= limits.max_total || state.leased_for(&route) >= limits.max_per_route {
            debug!(route = %route, leased = state.total, "waiting for connection lease");
            if self.shared.released.wait_until(&mut state, deadline).timed_out() {
                // A release may have landed together with the timeout.
                if state.total < limits.max_total
                    && state.leased_for(&route) < limits.max_per_route
                {
                    break;
                }
                let waited = started.elapsed();
                warn!(route = %route, waited_ms = waited.as_millis(), "connection pool exhausted");
                return Err(TransportError::PoolTimeout { route, waited });
            }
        }

        state.total += 1;
        *state.per_route.entry(route.clone()).or_insert(0) += 1;
        drop(state);

        Ok(Lease {
            pool: Arc::clone(&self.shared),
            route,
        })
    }

    /// Snapshot of current lease counts.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            leased_total: state.total,
            per_route: state.per_route.clone(),
        }
    }
}

/// Lease counts at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Leases held across all routes
    pub leased_total: usize,
    /// Leases held per route
    pub per_route: HashMap<String, usize>,
}

impl PoolStats {
    /// Leases held for `route`.
    #[must_use]
    pub fn leased_for(&self, route: &str) -> usize {
        self.per_route.get(route).copied().unwrap_or(0)
    }
}

/// A held connection slot, returned to the pool on drop.
#[derive(Debug)]
pub struct Lease {
    pool: Arc<Shared>,
    route: String,
}

impl Lease {
    /// Route this lease belongs to.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut state = self.pool.state.lock();
        state.total = state.total.saturating_sub(1);
        if let Some(count) = state.per_route.get_mut(&self.route) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.per_route.remove(&self.route);
            }
        }
        drop(state);
        // Waiters may be blocked on either limit, so wake them all.
        self.pool.released.notify_all();
    }
}

/// Route key of `url`: `scheme://host:port`.
#[must_use]
pub fn route_key(url: &Url) -> String {
    format!(
        "{}://{}:{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}
