//! Provider health table
//!
//! Owned by the gateway. The lock is a `std::sync::RwLock` and is never held
//! across an await point.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Health record of one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderHealth {
    /// Eligible for calls
    pub healthy: bool,
    /// Time of the most recent failure
    pub last_failure: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            last_failure: None,
        }
    }
}

impl ProviderHealth {
    /// Remaining cooldown, `None` when eligible
    fn remaining(&self, cooldown: Duration) -> Option<Duration> {
        if self.healthy {
            return None;
        }
        let elapsed = self.last_failure.map_or(cooldown, |t| t.elapsed());
        cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

#[derive(Debug)]
pub(crate) struct HealthTable {
    records: RwLock<HashMap<String, ProviderHealth>>,
    cooldown: Duration,
}

impl HealthTable {
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>, cooldown: Duration) -> Self {
        let records = names
            .into_iter()
            .map(|n| (n.to_string(), ProviderHealth::default()))
            .collect();
        Self {
            records: RwLock::new(records),
            cooldown,
        }
    }

    /// Whether `name` may be called, flipping it back to healthy once the
    /// cooldown has elapsed
    pub(crate) fn is_available(&self, name: &str) -> bool {
        {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            match records.get(name) {
                None => return false,
                Some(h) if h.healthy => return true,
                Some(h) if h.remaining(self.cooldown).is_some() => return false,
                Some(_) => {}
            }
        }

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if let Some(h) = records.get_mut(name) {
            if !h.healthy && h.remaining(self.cooldown).is_none() {
                h.healthy = true;
                info!(provider = %name, "Provider re-enabled after cooldown");
            }
            return h.healthy;
        }
        false
    }

    pub(crate) fn mark_failure(&self, name: &str) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let entry = records.entry(name.to_string()).or_default();
        entry.healthy = false;
        entry.last_failure = Some(Instant::now());
    }

    pub(crate) fn mark_success(&self, name: &str) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if let Some(h) = records.get_mut(name) {
            h.healthy = true;
        }
    }

    /// Effective health without mutating the table
    pub(crate) fn snapshot(&self, name: &str) -> (bool, Option<Duration>) {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        match records.get(name) {
            Some(h) => {
                let remaining = h.remaining(self.cooldown);
                (remaining.is_none(), remaining)
            }
            None => (false, None),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<ProviderHealth> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
    }
}
