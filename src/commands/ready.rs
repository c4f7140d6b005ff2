use std::time::Duration;

use reqwest::Client;
use tokio::time::{sleep, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Polls `url` until it answers with a success status or `budget` is spent.
///
/// Returns whether the endpoint became ready. Running out of budget is not an
/// error: the caller proceeds and lets the next command fail on its own.
pub async fn wait_until_ready(url: &str, budget: Duration) -> bool {
    let client = match Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            tracing::warn!(%error, "could not build readiness client, sleeping instead");
            sleep(budget).await;
            return false;
        }
    };

    tracing::info!(%url, seconds = budget.as_secs(), "waiting for service to become ready");
    let deadline = Instant::now() + budget;
    loop {
        match client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(%url, "service is ready");
                return true;
            }
            Ok(response) => {
                tracing::debug!(%url, status = %response.status(), "service not ready yet");
            }
            Err(error) => {
                tracing::debug!(%url, %error, "service not reachable yet");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(%url, "service did not become ready in time, continuing");
            return false;
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}
