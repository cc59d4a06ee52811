use crate::admin::{AdminClient, Convergence, ReplSetStatus};
use crate::api::ReplSetError;
use crate::time::{Clock, RealClock};
use tokio::time::Duration;

/// ConvergencePoller polls the seed member's status until exactly one primary is reported and
/// every other member has settled, or until its attempt budget runs out.
pub(crate) struct ConvergencePoller<C: Clock = RealClock> {
    logger: slog::Logger,
    clock: C,
    attempts: u32,
    interval: Duration,
}

impl ConvergencePoller<RealClock> {
    pub(crate) fn new(logger: slog::Logger, attempts: u32, interval: Duration) -> Self {
        Self::with_clock(logger, RealClock, attempts, interval)
    }
}

impl<C: Clock> ConvergencePoller<C> {
    pub(crate) fn with_clock(logger: slog::Logger, clock: C, attempts: u32, interval: Duration) -> Self {
        ConvergencePoller {
            logger,
            clock,
            attempts,
            interval,
        }
    }

    /// A failing status query counts as not converged yet. Only exhausting the budget is fatal.
    pub(crate) async fn await_primary(
        &mut self,
        client: &dyn AdminClient,
        expected_members: usize,
    ) -> Result<ReplSetStatus, ReplSetError> {
        let mut last_observed = String::from("no status polled");

        for attempt in 1..=self.attempts {
            match client.status().await {
                Ok(status) => match status.convergence(expected_members) {
                    Convergence::Converged => {
                        slog::info!(
                            self.logger,
                            "Converged after {} polls, primary is {}",
                            attempt,
                            status.primary().map(|p| p.name.as_str()).unwrap_or("?")
                        );
                        return Ok(status);
                    }
                    Convergence::Pending(reason) => {
                        slog::debug!(self.logger, "Poll {}/{}: {}", attempt, self.attempts, reason);
                        last_observed = reason;
                    }
                },
                Err(e) => {
                    slog::debug!(self.logger, "Poll {}/{}: status failed: {}", attempt, self.attempts, e);
                    last_observed = e.to_string();
                }
            }

            if attempt < self.attempts {
                self.clock.sleep(self.interval).await;
            }
        }

        Err(ReplSetError::ConvergenceTimeout {
            attempts: self.attempts,
            last_observed,
        })
    }
}
