//! A subject is both an observer and an observable: values pushed into it
//! fan out to every current subscriber.
//!
//! The publish side follows the observer contract, which means callers must
//! serialize their own `next`/`error`/`complete` calls (wrap the subject in
//! an [`crate::AsyncLock`] gate when several producers feed it). Values are
//! cloned once per subscriber.

use std::sync::{Arc, Mutex};

use crate::{
  observable::Observable,
  observer::{BoxObserver, Notification, Observer},
  subscription::ActionSubscription,
};

struct SubjectState<Item, Err> {
  observers: Vec<(u64, BoxObserver<Item, Err>)>,
  next_key: u64,
  // Keys unsubscribed while a dispatch had the observer list checked out.
  removed: Vec<u64>,
  terminal: Option<Notification<Item, Err>>,
}

pub struct Subject<Item, Err> {
  state: Arc<Mutex<SubjectState<Item, Err>>>,
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Subject { state: self.state.clone() } }
}

impl<Item, Err> Default for Subject<Item, Err> {
  fn default() -> Self {
    Subject {
      state: Arc::new(Mutex::new(SubjectState {
        observers: Vec::new(),
        next_key: 0,
        removed: Vec::new(),
        terminal: None,
      })),
    }
  }
}

impl<Item, Err> Subject<Item, Err> {
  pub fn new() -> Self { Self::default() }

  pub fn subscriber_count(&self) -> usize {
    self.state.lock().unwrap().observers.len()
  }

  /// Check the observer list out, dispatch outside the lock, merge back.
  /// Subscribers added during dispatch are kept; ones removed during
  /// dispatch are dropped on merge.
  fn dispatch(&self, deliver: impl Fn(&mut BoxObserver<Item, Err>)) {
    let mut checked_out = {
      let mut state = self.state.lock().unwrap();
      if state.terminal.is_some() {
        return;
      }
      std::mem::take(&mut state.observers)
    };
    for (_, observer) in checked_out.iter_mut() {
      deliver(observer);
    }
    let mut state = self.state.lock().unwrap();
    checked_out.retain(|(key, _)| !state.removed.contains(key));
    state.removed.clear();
    checked_out.append(&mut state.observers);
    state.observers = checked_out;
  }

  fn terminate(&self, terminal: Notification<Item, Err>)
  where
    Item: Clone,
    Err: Clone,
  {
    let observers = {
      let mut state = self.state.lock().unwrap();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(terminal.clone());
      state.removed.clear();
      std::mem::take(&mut state.observers)
    };
    for (_, mut observer) in observers {
      match terminal.clone() {
        Notification::Error(err) => observer.error(err),
        Notification::Complete => observer.complete(),
        Notification::Next(_) => unreachable!("terminal is never Next"),
      }
    }
  }
}

impl<Item, Err> Observer<Item, Err> for Subject<Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  fn next(&mut self, value: Item) {
    self.dispatch(|observer| observer.next(value.clone()));
  }

  fn error(&mut self, err: Err) { self.terminate(Notification::Error(err)); }

  fn complete(&mut self) { self.terminate(Notification::Complete); }

  fn is_closed(&self) -> bool {
    self.state.lock().unwrap().terminal.is_some()
  }
}

impl<Item, Err> Observable for Subject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;
  type Unsub = ActionSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let mut observer = observer;
    let key = {
      let mut state = self.state.lock().unwrap();
      let stored = state.terminal.clone();
      if let Some(terminal) = stored {
        drop(state);
        // A late subscriber gets the stored terminal right away.
        match terminal {
          Notification::Error(err) => observer.error(err),
          Notification::Complete => observer.complete(),
          Notification::Next(_) => unreachable!("terminal is never Next"),
        }
        return ActionSubscription::new(|| {});
      }
      let key = state.next_key;
      state.next_key += 1;
      state.observers.push((key, Box::new(observer)));
      key
    };
    let subject = self;
    ActionSubscription::new(move || {
      let mut state = subject.state.lock().unwrap();
      match state.observers.iter().position(|(k, _)| *k == key) {
        Some(index) => {
          state.observers.remove(index);
        }
        // Dispatch has the list checked out; leave a tombstone.
        None => state.removed.push(key),
      }
    })
  }
}
