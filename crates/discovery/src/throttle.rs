//! Per-run concurrency ceiling for outbound capability calls

use papertrail_common::capabilities::{Capability, CapabilityError};
use papertrail_common::metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Every capability call of a run goes through one `Throttle`, so at most
/// `limit` calls are in flight at once no matter how the stages fan out.
#[derive(Clone, Debug)]
pub struct Throttle {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl Throttle {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `call` while holding a permit
    pub async fn call<T, F>(&self, capability: Capability, call: F) -> Result<T, CapabilityError>
    where
        F: Future<Output = Result<T, CapabilityError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| CapabilityError::unavailable(capability, "run throttle closed"))?;

        let start = Instant::now();
        let result = call.await;
        metrics::record_capability_call(capability.as_str(), start.elapsed().as_secs_f64(), result.is_ok());
        result
    }
}
