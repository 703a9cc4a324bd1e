//! Cache invalidation seam.
//!
//! Response caching lives outside this workspace. Services only announce
//! which namespace went stale after a successful mutation.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheNamespace {
    Invoices,
    Reports,
    Projects,
    Tasks,
    Clients,
    Leads,
    Tickets,
}

impl CacheNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::Invoices => "invoices",
            CacheNamespace::Reports => "reports",
            CacheNamespace::Projects => "projects",
            CacheNamespace::Tasks => "tasks",
            CacheNamespace::Clients => "clients",
            CacheNamespace::Leads => "leads",
            CacheNamespace::Tickets => "tickets",
        }
    }
}

impl core::fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, namespace: CacheNamespace);
}

/// Logs invalidations and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCacheInvalidator;

impl CacheInvalidator for TracingCacheInvalidator {
    fn invalidate(&self, namespace: CacheNamespace) {
        tracing::debug!(%namespace, "cache invalidated");
    }
}

/// Remembers every invalidation, in order. For tests.
#[derive(Debug, Default)]
pub struct RecordingCacheInvalidator {
    seen: Mutex<Vec<CacheNamespace>>,
}

impl RecordingCacheInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidated(&self) -> Vec<CacheNamespace> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, namespace: CacheNamespace) -> bool {
        self.invalidated().contains(&namespace)
    }

    pub fn clear(&self) {
        match self.seen.lock() {
            Ok(mut seen) => seen.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl CacheInvalidator for RecordingCacheInvalidator {
    fn invalidate(&self, namespace: CacheNamespace) {
        match self.seen.lock() {
            Ok(mut seen) => seen.push(namespace),
            Err(poisoned) => poisoned.into_inner().push(namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_order_and_clears() {
        let cache = RecordingCacheInvalidator::new();
        cache.invalidate(CacheNamespace::Invoices);
        cache.invalidate(CacheNamespace::Reports);
        assert_eq!(
            cache.invalidated(),
            vec![CacheNamespace::Invoices, CacheNamespace::Reports]
        );
        assert!(cache.contains(CacheNamespace::Reports));
        cache.clear();
        assert!(cache.invalidated().is_empty());
    }

    #[test]
    fn namespace_names() {
        assert_eq!(CacheNamespace::Tickets.to_string(), "tickets");
        assert_eq!(serde_json::to_string(&CacheNamespace::Leads).unwrap(), "\"leads\"");
    }
}
