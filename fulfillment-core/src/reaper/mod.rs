//! Cart reaper
//!
//! Background task that periodically reclaims abandoned carts so their
//! reserved stock returns to the shelf. Expiry is also enforced lazily on
//! cart reads; the reaper exists for carts nobody ever touches again.

use crate::cart::CartStore;
use crate::common::error::CoreResult;
use crate::storage::Store;
use shared::util;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct CartReaper {
    store: Store,
    cart: CartStore,
    interval: Duration,
    expiry_ms: i64,
}

impl CartReaper {
    pub fn new(store: Store, cart: CartStore, interval_secs: u64, expiry_ms: i64) -> Self {
        Self {
            store,
            cart,
            interval: Duration::from_secs(interval_secs),
            expiry_ms,
        }
    }

    /// One sweep: find every cart idle past the threshold and reclaim it.
    ///
    /// Candidates come from one index scan; each reclamation then runs in
    /// its own transaction so one bad cart cannot poison the sweep, and a
    /// cart touched between scan and reclaim simply no longer matches.
    /// Returns the number of carts reclaimed.
    pub fn sweep(&self) -> CoreResult<usize> {
        let cutoff = util::now_ms() - self.expiry_ms;
        let expired = {
            let txn = self.store.begin_read()?;
            self.store.expired_cart_ids(&txn, cutoff)?
        };

        let mut reclaimed = 0;
        for cart_id in &expired {
            match self.cart.reclaim(cart_id) {
                Ok(true) => reclaimed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(cart_id, error = %e, "Failed to reclaim expired cart");
                }
            }
        }

        if reclaimed > 0 {
            tracing::info!(reclaimed, candidates = expired.len(), "Cart sweep finished");
        }
        Ok(reclaimed)
    }

    /// Run sweeps on the configured interval until cancelled
    pub async fn run(self, cancel_token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(interval_secs = self.interval.as_secs(), "Cart reaper started");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Cart reaper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep() {
                        tracing::error!(error = %e, "Cart sweep failed");
                    }
                }
            }
        }
    }

    /// Spawn the reaper loop onto the current runtime
    pub fn spawn(self, cancel_token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel_token))
    }
}
