use std::future::Future;
use std::time::Duration;

/// Upper bound on waiting for the station's port-open confirmation
pub const PORT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait for the port-open confirmation under `timeout`.
///
/// `signal` is whatever delivers the confirmation: the push-event subscription
/// or, lacking one, a fixed settle delay from [`settle_delay`].
pub async fn wait_for_port_open<F, T>(
    signal: F,
    timeout: Duration,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    with_timeout(timeout, signal).await
}

/// Stand-in for the push event: the station usually opens within a few seconds
pub async fn settle_delay(delay: Duration) {
    tracing::debug!(delay_ms = delay.as_millis() as u64, "waiting for station port");
    tokio::time::sleep(delay).await;
}

/// Overall deadline for any caller-side step the core does not bound itself
pub async fn with_timeout<F, T>(
    duration: Duration,
    future: F,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future).await
}
