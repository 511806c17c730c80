//! Bounded readiness polling.

use crate::job::JobContext;

/// Result of waiting on a readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateResult {
    Ready,
    /// The poll budget ran out.
    GaveUp,
    Stopped,
}

/// Poll `is_ready` once per job iteration, at most `polls` times.
///
/// Each poll waits one `sleep_time` first, so a gate that never opens ends
/// after exactly `polls * sleep_time`.
pub async fn wait_until_ready(
    ctx: &JobContext,
    polls: u32,
    mut is_ready: impl FnMut() -> bool,
) -> GateResult {
    for poll in 1..=polls {
        if !ctx.tick().await {
            return GateResult::Stopped;
        }
        if is_ready() {
            ctx.update(format!("ready after {poll} poll(s)"));
            return GateResult::Ready;
        }
    }
    GateResult::GaveUp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobManager, JobOutcome};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    struct GatedJob {
        polls: u32,
        ready_after: Option<u32>,
        checks: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Job for GatedJob {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn run(&mut self, ctx: &JobContext) -> JobOutcome {
            let checks = self.checks.clone();
            let ready_after = self.ready_after;
            let result = wait_until_ready(ctx, self.polls, move || {
                let n = checks.fetch_add(1, Ordering::SeqCst) + 1;
                ready_after.is_some_and(|r| n >= r)
            })
            .await;
            match result {
                GateResult::Ready => JobOutcome::Succeeded,
                GateResult::GaveUp => JobOutcome::skipped("never ready"),
                GateResult::Stopped => JobOutcome::stopped(),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_gives_up_after_budget() {
        let checks = Arc::new(AtomicU32::new(0));
        let manager = JobManager::new();
        let container = manager.get_container(GatedJob {
            polls: 180,
            ready_after: None,
            checks: checks.clone(),
        });
        let mut rx = container.listen();

        let started = Instant::now();
        container.start().unwrap();
        let outcome = container.join().await.unwrap();

        assert!(outcome.is_skipped());
        assert_eq!(checks.load(Ordering::SeqCst), 180);
        assert_eq!(started.elapsed(), Duration::from_secs(180));

        let mut completes = 0;
        while let Ok(event) = rx.try_recv() {
            if event.is_complete() {
                completes += 1;
            }
        }
        assert_eq!(completes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_gate_stops_polling() {
        let checks = Arc::new(AtomicU32::new(0));
        let manager = JobManager::new();
        let container = manager.get_container(GatedJob {
            polls: 180,
            ready_after: Some(4),
            checks: checks.clone(),
        });
        container.start().unwrap();
        assert_eq!(container.join().await, Some(JobOutcome::Succeeded));
        assert_eq!(checks.load(Ordering::SeqCst), 4);
    }
}
