//! Retrying fetcher.

use super::{
    models::{FetchFailure, GameFetchRequest, RawResponse, TransportFault},
    source::GameSource,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Retry policy for game fetches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchPolicy {
    /// Attempts per fetch, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Upper bound on the backoff delay (before jitter)
    pub max_delay: Duration,

    /// Bound on a single attempt
    pub attempt_timeout: Duration,

    /// Jitter added on top of the delay, as a fraction of it
    pub jitter_ratio: f64,

    /// Seed for the jitter RNG; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(5),
            jitter_ratio: 0.5,
            seed: None,
        }
    }
}

impl FetchPolicy {
    /// Fast, jitter-free policy for local game servers and tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            attempt_timeout: Duration::from_secs(2),
            jitter_ratio: 0.0,
            seed: Some(0),
        }
    }

    /// Backoff before attempt `failed_attempt + 1`, without jitter
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Fetches game state with bounded retries
pub struct GameFetcher {
    source: Arc<dyn GameSource>,
    policy: FetchPolicy,
    rng: Mutex<StdRng>,
}

impl GameFetcher {
    pub fn new(source: Arc<dyn GameSource>, policy: FetchPolicy) -> Self {
        let rng = match policy.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            source,
            policy,
            rng: Mutex::new(rng),
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetch a game, retrying transport faults.
    ///
    /// # Errors
    ///
    /// - [`FetchFailure::Exhausted`] once every attempt has failed, carrying
    ///   the last fault
    /// - [`FetchFailure::Cancelled`] if `cancel` fires first
    pub async fn fetch(
        &self,
        request: &GameFetchRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, FetchFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut current = request.clone();

        loop {
            current.attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(FetchFailure::Cancelled { request: current });
                }
                outcome = timeout(self.policy.attempt_timeout, self.source.get_game(&current)) => outcome,
            };

            let fault = match outcome {
                Ok(Ok(response)) => {
                    log::debug!(
                        "Fetched {} on attempt {} in {:?}",
                        current,
                        current.attempt,
                        response.latency
                    );
                    return Ok(response);
                }
                Ok(Err(fault)) => fault,
                Err(_) => TransportFault::Timeout {
                    after: self.policy.attempt_timeout,
                },
            };

            if current.attempt >= max_attempts {
                log::warn!(
                    "Giving up on {} after {} attempt(s): {}",
                    current,
                    current.attempt,
                    fault
                );
                return Err(FetchFailure::Exhausted {
                    attempts: current.attempt,
                    request: current,
                    last_attempt: fault,
                });
            }

            let delay = self.delay_after(current.attempt);
            log::debug!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                current.attempt,
                current,
                fault,
                delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(FetchFailure::Cancelled { request: current });
                }
                _ = sleep(delay) => {}
            }
        }
    }

    fn delay_after(&self, failed_attempt: u32) -> Duration {
        let delay = self.policy.backoff(failed_attempt);
        let max_jitter = delay.as_secs_f64() * self.policy.jitter_ratio;
        if max_jitter <= 0.0 {
            return delay;
        }

        let jitter = match self.rng.lock() {
            Ok(mut rng) => rng.random_range(0.0..=max_jitter),
            Err(poisoned) => poisoned.into_inner().random_range(0.0..=max_jitter),
        };
        delay + Duration::from_secs_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicU32, Ordering},
    };

    /// Replays scripted results, repeating the last one when exhausted
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<RawResponse, TransportFault>>>,
        fallback: Result<RawResponse, TransportFault>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(
            script: Vec<Result<RawResponse, TransportFault>>,
            fallback: Result<RawResponse, TransportFault>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GameSource for ScriptedSource {
        async fn get_game(
            &self,
            _request: &GameFetchRequest,
        ) -> Result<RawResponse, TransportFault> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    struct HangingSource;

    #[async_trait]
    impl GameSource for HangingSource {
        async fn get_game(
            &self,
            _request: &GameFetchRequest,
        ) -> Result<RawResponse, TransportFault> {
            std::future::pending().await
        }
    }

    fn refused() -> TransportFault {
        TransportFault::Connection("connection refused".into())
    }

    fn request() -> GameFetchRequest {
        GameFetchRequest::new("open-r1-b1", 1, 1)
    }

    #[tokio::test]
    async fn test_fail_twice_then_succeed_uses_three_attempts() {
        let source = ScriptedSource::new(
            vec![
                Err(refused()),
                Err(TransportFault::Status {
                    status: 503,
                    body: "busy".into(),
                }),
            ],
            Ok(RawResponse::ok(r#"{"status":"ongoing"}"#)),
        );
        let fetcher = GameFetcher::new(source.clone(), FetchPolicy::immediate(5));

        let response = fetcher
            .fetch(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(response.body, r#"{"status":"ongoing"}"#);
    }

    #[tokio::test]
    async fn test_always_failing_source_exhausts_budget() {
        let source = ScriptedSource::new(vec![], Err(refused()));
        let fetcher = GameFetcher::new(source.clone(), FetchPolicy::immediate(4));

        let failure = fetcher
            .fetch(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(source.calls(), 4);
        match failure {
            FetchFailure::Exhausted {
                request,
                attempts,
                last_attempt,
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(request.attempt, 4);
                assert_eq!(request.game_id, "open-r1-b1");
                assert_eq!(last_attempt, refused());
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_policy_makes_five_attempts() {
        let source = ScriptedSource::new(vec![], Err(refused()));
        let policy = FetchPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..FetchPolicy::default()
        };
        let fetcher = GameFetcher::new(source.clone(), policy);

        let _ = fetcher.fetch(&request(), &CancellationToken::new()).await;
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let policy = FetchPolicy {
            attempt_timeout: Duration::from_millis(10),
            ..FetchPolicy::immediate(2)
        };
        let fetcher = GameFetcher::new(Arc::new(HangingSource), policy);

        let failure = fetcher
            .fetch(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            failure,
            FetchFailure::Exhausted {
                attempts: 2,
                last_attempt: TransportFault::Timeout { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_in_flight_attempt() {
        let policy = FetchPolicy {
            attempt_timeout: Duration::from_secs(60),
            ..FetchPolicy::immediate(3)
        };
        let fetcher = GameFetcher::new(Arc::new(HangingSource), policy);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let failure = fetcher.fetch(&request(), &cancel).await.unwrap_err();
        assert!(failure.is_cancelled());
        assert_eq!(failure.request().attempt, 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_makes_no_request() {
        let source = ScriptedSource::new(vec![], Ok(RawResponse::ok("{}")));
        let fetcher = GameFetcher::new(source.clone(), FetchPolicy::immediate(3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = fetcher.fetch(&request(), &cancel).await.unwrap_err();
        assert!(failure.is_cancelled());
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = FetchPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(700),
            ..FetchPolicy::default()
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(700));
        assert_eq!(policy.backoff(40), Duration::from_millis(700));
    }

    #[test]
    fn test_jitter_stays_within_ratio() {
        let policy = FetchPolicy {
            base_delay: Duration::from_millis(100),
            jitter_ratio: 0.5,
            seed: Some(7),
            ..FetchPolicy::default()
        };
        let fetcher = GameFetcher::new(
            ScriptedSource::new(vec![], Err(refused())),
            policy,
        );

        for _ in 0..50 {
            let delay = fetcher.delay_after(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let policy = FetchPolicy {
            seed: Some(42),
            ..FetchPolicy::default()
        };
        let first = GameFetcher::new(ScriptedSource::new(vec![], Err(refused())), policy.clone());
        let second = GameFetcher::new(ScriptedSource::new(vec![], Err(refused())), policy);

        let a: Vec<Duration> = (1..5).map(|n| first.delay_after(n)).collect();
        let b: Vec<Duration> = (1..5).map(|n| second.delay_after(n)).collect();
        assert_eq!(a, b);
    }
}
