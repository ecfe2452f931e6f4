use crate::domain::model::{Batch, ForgetRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait ConfigProvider: Send + Sync {
    fn app_id(&self) -> &str;
    fn endpoint(&self) -> &str;
    fn dispatch_interval(&self) -> Duration;
    fn max_retries(&self) -> u32;
    fn request_timeout(&self) -> Duration;
}

/// Delivers batches and forget requests to the collector.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_batch(&self, endpoint: &str, batch: &Batch) -> Result<()>;
    async fn forget(&self, endpoint: &str, request: &ForgetRequest) -> Result<()>;
}
