use async_trait::async_trait;
use rollcall_core::RunOutcome;

/// A job body the [`Scheduler`](crate::Scheduler) can drive.
///
/// Implementations resolve their own options when invoked and report every
/// result, including misconfiguration, through [`RunOutcome`] rather than
/// errors.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self) -> RunOutcome;
}
