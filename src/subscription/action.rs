use std::sync::{Arc, Mutex};

use crate::subscription::SubscriptionLike;

/// A subscription built from an arbitrary cleanup action.
///
/// The action runs exactly once, on the first `unsubscribe`, no matter how
/// many clones of the handle race to call it.
#[derive(Clone)]
pub struct ActionSubscription(Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>);

impl ActionSubscription {
  pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
    ActionSubscription(Arc::new(Mutex::new(Some(Box::new(action)))))
  }
}

impl SubscriptionLike for ActionSubscription {
  fn unsubscribe(&mut self) {
    // Take the action out under the lock, run it after releasing it, so a
    // cleanup that re-enters this handle cannot deadlock.
    let action = self.0.lock().unwrap().take();
    if let Some(action) = action {
      action();
    }
  }

  fn is_closed(&self) -> bool { self.0.lock().unwrap().is_none() }
}

/// The no-op subscription, for sources with nothing to cancel (e.g. a
/// sequence that was already exhausted synchronously during subscribe).
#[derive(Clone, Copy, Debug, Default)]
pub struct NopSubscription;

impl SubscriptionLike for NopSubscription {
  #[inline]
  fn unsubscribe(&mut self) {}

  #[inline]
  fn is_closed(&self) -> bool { true }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn cleanup_runs_exactly_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let mut subscription = ActionSubscription::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    assert!(!subscription.is_closed());
    subscription.unsubscribe();
    subscription.unsubscribe();
    subscription.unsubscribe();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(subscription.is_closed());
  }

  #[test]
  fn racing_clones_run_cleanup_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let subscription = ActionSubscription::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    });

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let mut s = subscription.clone();
        std::thread::spawn(move || s.unsubscribe())
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }
}
