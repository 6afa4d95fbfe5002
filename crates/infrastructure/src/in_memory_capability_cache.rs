use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tasklane_application::CapabilityCache;
use tasklane_core::{AppResult, OrganizationId, UserId};
use tasklane_domain::RuleSet;
use tokio::sync::RwLock;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CapabilityCacheEntry {
    rule_set: RuleSet,
    expires_at: Instant,
}

#[derive(Debug)]
struct CapabilityCacheState {
    entries: HashMap<(OrganizationId, UserId), CapabilityCacheEntry>,
    last_sweep: Instant,
}

impl Default for CapabilityCacheState {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }
}

impl CapabilityCacheState {
    /// Drops expired entries at most once per sweep interval.
    fn sweep_expired(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }

        self.entries.retain(|_, entry| entry.expires_at > now);
        self.last_sweep = now;
    }
}

/// In-memory capability cache adapter.
///
/// Expired entries are dropped when read and swept periodically on write.
#[derive(Debug, Default)]
pub struct InMemoryCapabilityCache {
    state: RwLock<CapabilityCacheState>,
}

impl InMemoryCapabilityCache {
    /// Creates an empty in-memory capability cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CapabilityCache for InMemoryCapabilityCache {
    async fn get_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<RuleSet>> {
        let key = (organization_id, user_id);
        {
            let state = self.state.read().await;
            let Some(entry) = state.entries.get(&key) else {
                return Ok(None);
            };
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.rule_set.clone()));
            }
        }

        self.state.write().await.entries.remove(&key);
        Ok(None)
    }

    async fn set_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        rule_set: &RuleSet,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        let mut state = self.state.write().await;
        state.sweep_expired(now);
        state.entries.insert(
            (organization_id, user_id),
            CapabilityCacheEntry {
                rule_set: rule_set.clone(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn invalidate_actor(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<()> {
        self.state
            .write()
            .await
            .entries
            .remove(&(organization_id, user_id));

        Ok(())
    }

    async fn invalidate_organization(&self, organization_id: OrganizationId) -> AppResult<()> {
        self.state
            .write()
            .await
            .entries
            .retain(|(entry_organization_id, _), _| *entry_organization_id != organization_id);

        Ok(())
    }
}
