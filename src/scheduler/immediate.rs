use crate::scheduler::{CancelToken, Duration, Scheduler, TaskHandle};

/// Runs scheduled work synchronously on the calling stack.
///
/// Delays are honored by sleeping the calling thread, so this scheduler is
/// only appropriate for work that is cheap and for tests; by the time
/// `schedule` returns the task has already run (unless its token was
/// cancelled, which for this scheduler can only happen from the task
/// itself).
#[derive(Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn schedule<F>(&self, delay: Option<Duration>, task: F) -> TaskHandle
  where
    F: FnOnce(CancelToken) + Send + 'static,
  {
    let token = CancelToken::new();
    if let Some(delay) = delay {
      if !delay.is_zero() {
        std::thread::sleep(delay);
      }
    }
    if !token.is_cancelled() {
      task(token.clone());
    }
    TaskHandle::new(token)
  }
}
