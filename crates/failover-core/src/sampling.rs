//! Sample pacing shared by probe transports
//!
//! A probe of one address is `sample_count` attempts spaced ~100 ms apart.
//! Each attempt gets an equal slice of the overall timeout, and no attempt
//! starts once that timeout has elapsed. Transports only supply the attempt
//! itself.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::model::ProbeSample;

/// Pause between consecutive samples
pub const SAMPLE_SPACING: Duration = Duration::from_millis(100);

/// Smallest budget given to a single attempt
pub const MIN_ATTEMPT_BUDGET: Duration = Duration::from_millis(1);

/// Budget of one attempt
pub fn attempt_budget(timeout: Duration, sample_count: u32) -> Duration {
    (timeout / sample_count.max(1)).max(MIN_ATTEMPT_BUDGET)
}

/// Run up to `sample_count` attempts within `timeout`
///
/// `attempt` receives the sequence number and the time it may take, and
/// resolves to the round-trip time of a reply or `None` for a lost probe.
pub async fn collect_samples<F, Fut>(
    address: &str,
    timeout: Duration,
    sample_count: u32,
    mut attempt: F,
) -> ProbeSample
where
    F: FnMut(u16, Duration) -> Fut,
    Fut: Future<Output = Option<Duration>>,
{
    let budget = attempt_budget(timeout, sample_count);
    let deadline = Instant::now() + timeout;

    let mut packets_sent = 0u32;
    let mut rtts = Vec::with_capacity(sample_count as usize);

    for index in 0..sample_count {
        if index > 0 {
            tokio::time::sleep(SAMPLE_SPACING).await;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        packets_sent += 1;
        if let Some(rtt) = attempt(index as u16, budget.min(deadline - now)).await {
            rtts.push(rtt);
        }
    }

    let average_rtt_millis = if rtts.is_empty() {
        0.0
    } else {
        rtts.iter().map(|d| d.as_secs_f64() * 1000.0).sum::<f64>() / rtts.len() as f64
    };

    ProbeSample {
        address: address.to_string(),
        packets_sent,
        packets_received: rtts.len() as u32,
        average_rtt_millis,
    }
}
