use std::sync::{Arc, Mutex};

use crate::subscription::{BoxSubscription, SubscriptionLike};

enum SingleState {
  Empty,
  Set(BoxSubscription),
  Closed,
}

/// A subscription slot that can be assigned at most once.
///
/// This models the two-phase wiring combinators need when an observer has to
/// exist before its own upstream subscription does: allocate the handle
/// first, subscribe, then bind the result. If the handle was unsubscribed
/// before the assignment lands, disposal wins and the incoming subscription
/// is unsubscribed on arrival instead of stored.
#[derive(Clone)]
pub struct SingleAssignmentSubscription(Arc<Mutex<SingleState>>);

impl Default for SingleAssignmentSubscription {
  fn default() -> Self { Self::new() }
}

impl SingleAssignmentSubscription {
  pub fn new() -> Self {
    SingleAssignmentSubscription(Arc::new(Mutex::new(SingleState::Empty)))
  }

  /// Bind the inner subscription.
  ///
  /// # Panics
  ///
  /// Panics if a subscription was already assigned; assigning twice is a
  /// caller bug, not a runtime condition.
  pub fn set(&self, subscription: impl SubscriptionLike + Send + 'static) {
    let incoming: BoxSubscription = Box::new(subscription);
    let dispose_now = {
      let mut state = self.0.lock().unwrap();
      match &*state {
        SingleState::Empty => {
          *state = SingleState::Set(incoming);
          None
        }
        SingleState::Set(_) => {
          panic!("SingleAssignmentSubscription assigned twice")
        }
        SingleState::Closed => Some(incoming),
      }
    };
    if let Some(mut s) = dispose_now {
      s.unsubscribe();
    }
  }
}

impl SubscriptionLike for SingleAssignmentSubscription {
  fn unsubscribe(&mut self) {
    let inner = {
      let mut state = self.0.lock().unwrap();
      match std::mem::replace(&mut *state, SingleState::Closed) {
        SingleState::Set(s) => Some(s),
        _ => None,
      }
    };
    if let Some(mut s) = inner {
      s.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool {
    matches!(&*self.0.lock().unwrap(), SingleState::Closed)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::subscription::ActionSubscription;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting(count: &Arc<AtomicUsize>) -> ActionSubscription {
    let c = count.clone();
    ActionSubscription::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[test]
  fn assign_then_unsubscribe() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut slot = SingleAssignmentSubscription::new();
    slot.set(counting(&count));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    slot.unsubscribe();
    slot.unsubscribe();
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn dispose_wins_over_late_assignment() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut slot = SingleAssignmentSubscription::new();
    slot.unsubscribe();
    slot.set(counting(&count));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(slot.is_closed());
  }

  #[test]
  #[should_panic]
  fn double_assignment_panics() {
    let count = Arc::new(AtomicUsize::new(0));
    let slot = SingleAssignmentSubscription::new();
    slot.set(counting(&count));
    slot.set(counting(&count));
  }

  #[test]
  fn racing_dispose_and_assign_runs_cleanup_once() {
    for _ in 0..64 {
      let count = Arc::new(AtomicUsize::new(0));
      let slot = SingleAssignmentSubscription::new();
      let assign = {
        let slot = slot.clone();
        let inner = counting(&count);
        std::thread::spawn(move || slot.set(inner))
      };
      let dispose = {
        let mut slot = slot.clone();
        std::thread::spawn(move || slot.unsubscribe())
      };
      assign.join().unwrap();
      dispose.join().unwrap();
      let mut slot = slot.clone();
      slot.unsubscribe();
      assert_eq!(count.load(Ordering::SeqCst), 1);
    }
  }
}
