//! Invocation context: the execution deadline imposed by the invoker.

use std::time::Duration;

use tokio::time::Instant;

/// Deadline of the current invocation.
///
/// Built on `tokio::time::Instant` so paused-time tests advance it together
/// with the poll loop's sleeps.
#[derive(Debug, Clone, Copy)]
pub struct InvocationContext {
    deadline: Instant,
}

impl InvocationContext {
    /// Creates a context whose deadline is `budget` from now.
    #[must_use]
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }

    /// Returns the time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down_and_saturates() {
        let ctx = InvocationContext::with_budget(Duration::from_secs(10));
        assert_eq!(ctx.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(ctx.remaining(), Duration::from_secs(6));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }
}
