//! A non-blocking mutual-exclusion primitive for asynchronous callbacks.
//!
//! Combinators that feed one downstream observer from several concurrent
//! producers (merge, the queue drains) need their delivery serialized, but
//! must never park an OS thread inside a notification callback. `AsyncLock`
//! queues contending work instead: the thread that finds the lock free runs
//! its action in place and then drains, in FIFO order, whatever other
//! threads enqueued meanwhile.

use std::{
  collections::VecDeque,
  panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
  sync::Mutex,
};

type Continuation = Box<dyn FnOnce() + Send>;

struct LockState {
  queue: VecDeque<Continuation>,
  acquired: bool,
  faulted: bool,
}

/// Queue-based async lock.
///
/// Not reentrant in the blocking sense: a `wait` issued from inside an
/// action does not deadlock, it enqueues the new action to run after the
/// current one returns. What an action must never do is block waiting for
/// work it enqueued itself.
///
/// If an action panics the lock is poisoned: pending and future work is
/// dropped and the panic resumes on the thread that ran the action.
pub struct AsyncLock {
  state: Mutex<LockState>,
}

impl Default for AsyncLock {
  fn default() -> Self {
    AsyncLock {
      state: Mutex::new(LockState {
        queue: VecDeque::new(),
        acquired: false,
        faulted: false,
      }),
    }
  }
}

impl AsyncLock {
  pub fn new() -> Self { Self::default() }

  /// Run `action` under the lock, or enqueue it if the lock is held.
  ///
  /// The fast path (lock free) runs `action` synchronously on the calling
  /// thread; the thread then becomes the drain owner and also runs any
  /// continuations that arrive before the queue empties.
  pub fn wait(&self, action: impl FnOnce() + Send + 'static) {
    let owner = {
      let mut state = self.state.lock().unwrap();
      if state.faulted {
        return;
      }
      state.queue.push_back(Box::new(action));
      if state.acquired {
        false
      } else {
        state.acquired = true;
        true
      }
    };
    if !owner {
      return;
    }

    loop {
      let work = {
        let mut state = self.state.lock().unwrap();
        match state.queue.pop_front() {
          Some(work) => work,
          None => {
            state.acquired = false;
            return;
          }
        }
      };
      if let Err(payload) = catch_unwind(AssertUnwindSafe(work)) {
        let mut state = self.state.lock().unwrap();
        state.faulted = true;
        state.queue.clear();
        state.acquired = false;
        drop(state);
        resume_unwind(payload);
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  #[test]
  fn free_lock_runs_synchronously() {
    let lock = AsyncLock::new();
    let mut ran = false;
    // FnOnce + 'static is required by the signature, but the fast path runs
    // before `wait` returns, observable through a shared cell.
    let flag = Arc::new(AtomicUsize::new(0));
    let f = flag.clone();
    lock.wait(move || {
      f.store(1, Ordering::SeqCst);
    });
    if flag.load(Ordering::SeqCst) == 1 {
      ran = true;
    }
    assert!(ran);
  }

  #[test]
  fn nested_wait_defers_until_outer_returns() {
    let lock = Arc::new(AsyncLock::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let l = lock.clone();
    let o = order.clone();
    lock.wait(move || {
      o.lock().unwrap().push("outer-start");
      let o2 = o.clone();
      l.wait(move || o2.lock().unwrap().push("inner"));
      o.lock().unwrap().push("outer-end");
    });

    assert_eq!(
      *order.lock().unwrap(),
      vec!["outer-start", "outer-end", "inner"]
    );
  }

  #[test]
  fn contended_actions_never_overlap() {
    let lock = Arc::new(AsyncLock::new());
    let depth = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let lock = lock.clone();
        let depth = depth.clone();
        let overlapped = overlapped.clone();
        let total = total.clone();
        std::thread::spawn(move || {
          for _ in 0..200 {
            let depth = depth.clone();
            let overlapped = overlapped.clone();
            let total = total.clone();
            lock.wait(move || {
              if depth.fetch_add(1, Ordering::SeqCst) != 0 {
                overlapped.fetch_add(1, Ordering::SeqCst);
              }
              total.fetch_add(1, Ordering::SeqCst);
              depth.fetch_sub(1, Ordering::SeqCst);
            });
          }
        })
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }

    assert_eq!(overlapped.load(Ordering::SeqCst), 0);
    assert_eq!(total.load(Ordering::SeqCst), 8 * 200);
  }

  #[test]
  fn faulted_lock_drops_later_work() {
    let lock = Arc::new(AsyncLock::new());
    let ran_after_fault = Arc::new(AtomicUsize::new(0));

    let result = catch_unwind(AssertUnwindSafe(|| {
      lock.wait(|| panic!("callback failure"));
    }));
    assert!(result.is_err());

    let r = ran_after_fault.clone();
    lock.wait(move || {
      r.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(ran_after_fault.load(Ordering::SeqCst), 0);
  }
}
