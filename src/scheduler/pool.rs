use futures::executor::ThreadPool;
use once_cell::sync::Lazy;

use crate::scheduler::{CancelToken, Duration, Scheduler, TaskHandle};

/// The process-wide default pool, lazily created. The scheduler itself holds
/// no per-subscription state; it is a stateless dispatch handle over the
/// executor queue.
static DEFAULT_POOL: Lazy<PoolScheduler> = Lazy::new(|| {
  PoolScheduler::with_pool(
    ThreadPool::new().expect("create default scheduler thread pool"),
  )
});

/// The default pool-based scheduler.
pub fn default_pool() -> PoolScheduler { DEFAULT_POOL.clone() }

/// Schedules work onto a futures thread pool; delays await an async sleep
/// instead of parking a pool thread.
#[derive(Clone)]
pub struct PoolScheduler {
  pool: ThreadPool,
}

impl PoolScheduler {
  pub fn new() -> Self { default_pool() }

  pub fn with_pool(pool: ThreadPool) -> Self { PoolScheduler { pool } }
}

impl Default for PoolScheduler {
  fn default() -> Self { Self::new() }
}

impl Scheduler for PoolScheduler {
  fn schedule<F>(&self, delay: Option<Duration>, task: F) -> TaskHandle
  where
    F: FnOnce(CancelToken) + Send + 'static,
  {
    let token = CancelToken::new();
    let task_token = token.clone();
    self.pool.spawn_ok(async move {
      if let Some(delay) = delay {
        if !delay.is_zero() {
          futures_time::task::sleep(futures_time::time::Duration::from(
            delay,
          ))
          .await;
        }
      }
      if !task_token.is_cancelled() {
        task(task_token.clone());
      }
    });
    TaskHandle::new(token)
  }
}
