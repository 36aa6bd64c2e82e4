use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

/// Source of the current time and of pauses, so batches can be driven
/// without real waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Leaky bucket of capacity one: consecutive `acquire` calls are spaced by
/// at least `interval`.
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<DateTime<Utc>>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last: Mutex::new(None),
        }
    }

    pub async fn acquire(&self, clock: &dyn Clock) {
        if self.interval.is_zero() {
            return;
        }

        let wait = {
            let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            (*last).and_then(|last| {
                let elapsed = (clock.now() - last).to_std().unwrap_or_default();
                self.interval.checked_sub(elapsed)
            })
        };

        if let Some(wait) = wait.filter(|wait| !wait.is_zero()) {
            log::trace!("throttling next dispatch for {:?}", wait);
            clock.sleep(wait).await;
        }

        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(clock.now());
    }

    /// Forget the previous acquire, so the next batch starts without a pause.
    pub fn reset(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct SteppingClock {
        now: Mutex<DateTime<Utc>>,
        slept: Mutex<Vec<Duration>>,
    }

    impl SteppingClock {
        fn new() -> Self {
            SteppingClock {
                now: Mutex::new(Utc.with_ymd_and_hms(2030, 3, 14, 17, 0, 0).unwrap()),
                slept: Mutex::new(Vec::new()),
            }
        }

        fn advance(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(duration).unwrap();
        }
    }

    #[async_trait]
    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
            self.advance(duration);
        }
    }

    #[tokio::test]
    async fn test_first_acquire_does_not_wait() {
        let clock = SteppingClock::new();
        let throttle = Throttle::new(Duration::from_secs(1));

        throttle.acquire(&clock).await;

        assert!(clock.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_acquires_wait_the_full_interval() {
        let clock = SteppingClock::new();
        let throttle = Throttle::new(Duration::from_secs(1));

        throttle.acquire(&clock).await;
        throttle.acquire(&clock).await;
        throttle.acquire(&clock).await;

        assert_eq!(
            *clock.slept.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(1)]
        );
    }

    #[tokio::test]
    async fn test_elapsed_time_counts_towards_the_interval() {
        let clock = SteppingClock::new();
        let throttle = Throttle::new(Duration::from_secs(1));

        throttle.acquire(&clock).await;
        clock.advance(Duration::from_millis(700));
        throttle.acquire(&clock).await;
        clock.advance(Duration::from_secs(5));
        throttle.acquire(&clock).await;

        assert_eq!(
            *clock.slept.lock().unwrap(),
            vec![Duration::from_millis(300)]
        );
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let clock = SteppingClock::new();
        let throttle = Throttle::new(Duration::ZERO);

        throttle.acquire(&clock).await;
        throttle.acquire(&clock).await;

        assert!(clock.slept.lock().unwrap().is_empty());
    }
}
