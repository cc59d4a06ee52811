#[cfg(test)]
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// Clock is the only source of "when" for the convergence poller. Polling against a mock
/// clock lets tests step through poll intervals without sleeping for real.
#[async_trait::async_trait]
pub(crate) trait Clock: Clone + Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep_until(&mut self, deadline: Instant);

    async fn sleep(&mut self, duration: Duration) {
        let deadline = self.now() + duration;
        self.sleep_until(deadline).await;
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct RealClock;

#[async_trait::async_trait]
impl Clock for RealClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
pub(crate) fn mocked_clock() -> (MockClock, MockClockController) {
    let now = Instant::now();
    let (tx, rx) = watch::channel(now);
    let clock = MockClock { current_time: rx };
    let controller = MockClockController {
        current_time: tx,
        time_of_instantiation: now,
    };

    (clock, controller)
}

#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MockClock {
    current_time: watch::Receiver<Instant>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_time.borrow()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        loop {
            if *self.current_time.borrow() >= deadline {
                return;
            }

            // Controller dropped means time will never move again.
            if self.current_time.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
pub(crate) struct MockClockController {
    current_time: watch::Sender<Instant>,
    time_of_instantiation: Instant,
}

#[cfg(test)]
impl MockClockController {
    pub(crate) fn current_time(&self) -> Instant {
        *self.current_time.borrow()
    }

    pub(crate) fn elapsed_time(&self) -> Duration {
        self.current_time() - self.time_of_instantiation
    }

    /// Advance in steps no larger than the interval you want to observe. `sleep_until()` only
    /// promises to return once `now` is at or past its deadline, so one huge step wakes every
    /// sleeper at once.
    pub(crate) fn advance(&mut self, duration: Duration) {
        let new_now = *self.current_time.borrow() + duration;
        let _ = self.current_time.send_replace(new_now);
    }
}
