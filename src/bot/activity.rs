//! Activity events for audit and telemetry.

use async_trait::async_trait;

pub const ACTIVITY_LIST: &str = "activity.virtualserver.list";

/// Receives an event for every successful bot action.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn emit(&self, activity_id: &str);
}

/// Writes activity to the log under the `activity` target.
pub struct TracingActivity;

#[async_trait]
impl ActivitySink for TracingActivity {
    async fn emit(&self, activity_id: &str) {
        tracing::info!(target: "activity", activity_id, "Bot activity");
    }
}
