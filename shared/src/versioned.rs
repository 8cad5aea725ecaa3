//! Optimistic version discipline
//!
//! Every persisted record carries a monotonically increasing `version`.
//! A write is only valid against the version the writer last read; the
//! storage layer checks this and bumps the version by exactly 1 on every
//! committed write. No record ever skips or reuses a version.

/// A record participating in optimistic concurrency control
pub trait Versioned {
    /// Version captured at the last read
    fn version(&self) -> u64;

    /// Set by the storage layer when a write commits
    fn set_version(&mut self, version: u64);
}

#[macro_export]
macro_rules! impl_versioned {
    ($ty:ty) => {
        impl $crate::versioned::Versioned for $ty {
            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}
