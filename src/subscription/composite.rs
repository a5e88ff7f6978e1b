use std::{
  panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
  sync::{Arc, Mutex},
};

use smallvec::SmallVec;

use crate::subscription::{BoxSubscription, SubscriptionLike};

struct CompositeState {
  closed: bool,
  next_key: u64,
  teardown: SmallVec<[(u64, BoxSubscription); 2]>,
}

/// A mutable collection of subscriptions that is itself a subscription.
///
/// Members can be added and removed while the composite is live;
/// unsubscribing the composite unsubscribes every member. A member added
/// after the composite closed is unsubscribed on arrival.
#[derive(Clone)]
pub struct CompositeSubscription(Arc<Mutex<CompositeState>>);

impl Default for CompositeSubscription {
  fn default() -> Self {
    CompositeSubscription(Arc::new(Mutex::new(CompositeState {
      closed: false,
      next_key: 0,
      teardown: SmallVec::new(),
    })))
  }
}

impl CompositeSubscription {
  pub fn new() -> Self { Self::default() }

  /// Add a member, returning a key usable with [`remove`](Self::remove).
  /// Returns `None` when the composite was already closed; the member is
  /// then unsubscribed on arrival instead of stored.
  pub fn add(
    &self,
    subscription: impl SubscriptionLike + Send + 'static,
  ) -> Option<u64> {
    let incoming: BoxSubscription = Box::new(subscription);
    let dispose_now = {
      let mut state = self.0.lock().unwrap();
      if state.closed {
        Some(incoming)
      } else {
        state.teardown.retain(|(_, s)| !s.is_closed());
        let key = state.next_key;
        state.next_key += 1;
        state.teardown.push((key, incoming));
        return Some(key);
      }
    };
    if let Some(mut s) = dispose_now {
      s.unsubscribe();
    }
    None
  }

  /// Remove a member by key and unsubscribe it. Unknown keys are ignored.
  pub fn remove(&self, key: u64) {
    let removed = {
      let mut state = self.0.lock().unwrap();
      let pos = state.teardown.iter().position(|(k, _)| *k == key);
      pos.map(|i| state.teardown.remove(i).1)
    };
    if let Some(mut s) = removed {
      s.unsubscribe();
    }
  }

  pub fn teardown_size(&self) -> usize { self.0.lock().unwrap().teardown.len() }
}

impl SubscriptionLike for CompositeSubscription {
  fn unsubscribe(&mut self) {
    let members = {
      let mut state = self.0.lock().unwrap();
      if state.closed {
        return;
      }
      state.closed = true;
      std::mem::take(&mut state.teardown)
    };
    unsubscribe_all(members.into_iter().map(|(_, s)| s));
  }

  fn is_closed(&self) -> bool { self.0.lock().unwrap().closed }
}

/// A composite whose membership is frozen at construction.
///
/// Used to bind the fixed set of cancellation sources one combinator
/// instance owns: typically a handful of single-assignment slots created
/// before the upstream subscriptions exist.
#[derive(Clone)]
pub struct StableCompositeSubscription(Arc<Mutex<Option<Box<[BoxSubscription]>>>>);

impl StableCompositeSubscription {
  pub fn new(members: impl IntoIterator<Item = BoxSubscription>) -> Self {
    let members: Box<[BoxSubscription]> = members.into_iter().collect();
    StableCompositeSubscription(Arc::new(Mutex::new(Some(members))))
  }
}

impl SubscriptionLike for StableCompositeSubscription {
  fn unsubscribe(&mut self) {
    let members = self.0.lock().unwrap().take();
    if let Some(members) = members {
      unsubscribe_all(members.into_vec().into_iter());
    }
  }

  fn is_closed(&self) -> bool { self.0.lock().unwrap().is_none() }
}

/// Unsubscribe every member even if some panic; the first panic payload is
/// resumed after all members were attempted.
fn unsubscribe_all(members: impl Iterator<Item = BoxSubscription>) {
  let mut first_panic = None;
  for mut member in members {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| member.unsubscribe())) {
      first_panic.get_or_insert(payload);
    }
  }
  if let Some(payload) = first_panic {
    resume_unwind(payload);
  }
}
