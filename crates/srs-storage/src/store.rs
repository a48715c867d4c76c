//! Combined store trait.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::repos::{ResultRepo, ScheduleRepo, StatsRepo};

#[async_trait]
pub trait ResultStore: ScheduleRepo + ResultRepo + StatsRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;
}
