//! Contract with the surrounding application.

use verifyflow_core::JobId;

/// The host that owns the verification step (the connection context in
/// the wizard). It is only notified; it never drives the watcher.
pub trait ConnectionHost: Send + Sync + 'static {
    /// Called exactly once when the awaited job is confirmed complete.
    /// Hands the identifier to the host's own job-status resolver.
    fn set_job_id(&self, job_id: &JobId);

    /// Called when the page carried no job identifier. Non-fatal: the step
    /// stays reachable and the watcher simply idles.
    fn on_missing_job_id(&self) {
        tracing::warn!("No jobIds query parameter found; watcher stays idle");
    }
}
