//! Deadline-bounded retry of an idempotent async action.
//!
//! An action is attempted repeatedly with a backoff schedule injected by the
//! caller; the loop gives up once the next sleep would cross the deadline
//! and returns the last error. Chain submitters and the Electrs HTTP calls
//! run under this primitive.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use rand::Rng;

/// Initial delay of the default exponential backoff schedule.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Cap of the default exponential backoff schedule.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Retries `generator` until it succeeds or `deadline` elapses.
///
/// After each failed attempt the loop sleeps `backoff(attempt)` (attempts
/// are counted from 0) unless that sleep would cross the deadline, in which
/// case the last error is returned. The first attempt always runs,
/// regardless of the deadline.
pub async fn retry_until_deadline<T, E, Fut, Gen, B>(
    deadline: Duration,
    backoff: B,
    mut generator: Gen,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    Gen: FnMut() -> Fut,
    B: Fn(u32) -> Duration,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match generator().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let delay = backoff(attempt);
                if started.elapsed() + delay >= deadline {
                    return Err(error);
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retries `generator` under `deadline` with exponential backoff
/// 500 ms → 30 s, jittered ±20 % to keep load-balanced back-ends from
/// seeing synchronized retries.
pub async fn retry_with_default<T, E, Fut, Gen>(
    deadline: Duration,
    generator: Gen,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    Gen: FnMut() -> Fut,
{
    retry_until_deadline(deadline, default_backoff, generator).await
}

/// The default exponential backoff schedule: `500 ms * 2^attempt`, capped
/// at 30 s, jittered ±20 %.
pub fn default_backoff(attempt: u32) -> Duration {
    let exponential = DEFAULT_INITIAL_DELAY.as_millis() << attempt.min(16);
    let capped = exponential.min(DEFAULT_MAX_DELAY.as_millis()) as u64;
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    Duration::from_millis((capped as f64 * jitter) as u64)
}
