//! Redis-backed capability cache.
//!
//! Keys:
//! - `{prefix}:epoch:{organization}` organization epoch counter
//! - `{prefix}:version:{organization}:{user}` actor version counter
//! - `{prefix}:rules:{organization}:{user}:e{epoch}:v{version}` serialized rule set
//!
//! Invalidation only increments counters; stale rule keys become unreachable
//! and expire through their ttl.

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use tasklane_application::CapabilityCache;
use tasklane_core::{AppError, AppResult, OrganizationId, UserId};
use tasklane_domain::RuleSet;

const READ_RULE_SET_SCRIPT: &str = r#"
local epoch = redis.call('GET', KEYS[1]) or '0'
local version = redis.call('GET', KEYS[2]) or '0'
return redis.call('GET', ARGV[1] .. ':e' .. epoch .. ':v' .. version)
"#;

const WRITE_RULE_SET_SCRIPT: &str = r#"
local epoch = redis.call('GET', KEYS[1]) or '0'
local version = redis.call('GET', KEYS[2]) or '0'
redis.call('SET', ARGV[1] .. ':e' .. epoch .. ':v' .. version, ARGV[2], 'EX', tonumber(ARGV[3]))
return 1
"#;

/// Redis implementation of the capability cache port.
#[derive(Clone)]
pub struct RedisCapabilityCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisCapabilityCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn epoch_key(&self, organization_id: OrganizationId) -> String {
        format!("{}:epoch:{organization_id}", self.key_prefix)
    }

    fn version_key(&self, organization_id: OrganizationId, user_id: UserId) -> String {
        format!("{}:version:{organization_id}:{user_id}", self.key_prefix)
    }

    fn rules_key_base(&self, organization_id: OrganizationId, user_id: UserId) -> String {
        format!("{}:rules:{organization_id}:{user_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl CapabilityCache for RedisCapabilityCache {
    async fn get_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<RuleSet>> {
        let mut connection = self.connection().await?;
        let encoded: Option<String> = Script::new(READ_RULE_SET_SCRIPT)
            .key(self.epoch_key(organization_id))
            .key(self.version_key(organization_id, user_id))
            .arg(self.rules_key_base(organization_id, user_id))
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to read capability cache entry: {error}"))
            })?;

        encoded
            .as_deref()
            .map(|value| {
                serde_json::from_str::<RuleSet>(value).map_err(|error| {
                    AppError::Internal(format!("invalid capability cache entry: {error}"))
                })
            })
            .transpose()
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

        let value = serde_json::to_string(rule_set).map_err(|error| {
            AppError::Internal(format!("failed to encode capability cache entry: {error}"))
        })?;
        let mut connection = self.connection().await?;
        let _: i64 = Script::new(WRITE_RULE_SET_SCRIPT)
            .key(self.epoch_key(organization_id))
            .key(self.version_key(organization_id, user_id))
            .arg(self.rules_key_base(organization_id, user_id))
            .arg(value)
            .arg(ttl_seconds)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to write capability cache entry: {error}"))
            })?;

        Ok(())
    }

    async fn invalidate_actor(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<()> {
        let mut connection = self.connection().await?;
        let _: i64 = connection
            .incr(self.version_key(organization_id, user_id), 1)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to bump capability cache version: {error}"))
            })?;

        Ok(())
    }

    async fn invalidate_organization(&self, organization_id: OrganizationId) -> AppResult<()> {
        let mut connection = self.connection().await?;
        let _: i64 = connection
            .incr(self.epoch_key(organization_id), 1)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to bump capability cache epoch: {error}"))
            })?;

        Ok(())
    }
}
