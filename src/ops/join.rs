//! Join patterns: wait for one value from each of several sources, combine
//! them, and repeat.
//!
//! `a.and(b).then(f)` builds a [`Plan`]; [`when`] activates a set of plans
//! against one downstream. Every distinct source feeds a single shared FIFO
//! queue no matter how many plans reference it, so competing plans consume
//! values exclusively: a value matched by one plan is gone for the others.
//! All queueing and matching runs under one gate, which makes a plan's
//! combine-and-emit atomic with respect to every other source.
//!
//! A plan deactivates when any of its sources completes with an empty
//! pending contribution; the joined stream completes when no plan is left
//! and errors as soon as any participating source errors.

use std::{
  any::Any,
  collections::{HashMap, VecDeque},
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
  },
};

use crate::{
  async_lock::AsyncLock,
  observable::{BoxedCloneObservable, Observable},
  observer::{BoxObserver, Observer, SharedObserver},
  subscription::{
    ActionSubscription, CompositeSubscription, SingleAssignmentSubscription,
    SubscriptionLike,
  },
};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_PLAN_KEY: AtomicU64 = AtomicU64::new(1);

/// An observable tagged with a stable identity for queue sharing.
///
/// Clones keep the id, so the same `JoinSource` used in several patterns
/// (or twice within one) resolves to one shared queue at activation.
pub struct JoinSource<Item, Err> {
  id: u64,
  source: BoxedCloneObservable<Item, Err>,
}

impl<Item, Err> Clone for JoinSource<Item, Err> {
  fn clone(&self) -> Self {
    JoinSource { id: self.id, source: self.source.clone() }
  }
}

impl<Item: 'static, Err: 'static> JoinSource<Item, Err> {
  pub fn new<S>(source: S) -> Self
  where
    S: Observable<Item = Item, Err = Err> + Clone + Send + 'static,
  {
    JoinSource {
      id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
      source: BoxedCloneObservable::new(source),
    }
  }
}

/// Two sources awaiting a combiner.
pub struct Pattern2<A, B, Err> {
  a: JoinSource<A, Err>,
  b: JoinSource<B, Err>,
}

/// Three sources awaiting a combiner.
pub struct Pattern3<A, B, C, Err> {
  a: JoinSource<A, Err>,
  b: JoinSource<B, Err>,
  c: JoinSource<C, Err>,
}

impl<A, B, Err> Pattern2<A, B, Err>
where
  A: Send + 'static,
  B: Send + 'static,
  Err: Send + 'static,
{
  pub fn new(a: JoinSource<A, Err>, b: JoinSource<B, Err>) -> Self {
    Pattern2 { a, b }
  }

  /// Extend the pattern with a third source.
  pub fn and<S, C>(self, other: S) -> Pattern3<A, B, C, Err>
  where
    S: Observable<Item = C, Err = Err> + Clone + Send + 'static,
    C: Send + 'static,
  {
    Pattern3 { a: self.a, b: self.b, c: JoinSource::new(other) }
  }

  /// Bind a combiner, producing an activatable plan.
  pub fn then<R, F>(self, mut combine: F) -> Plan<R, Err>
  where
    F: FnMut(A, B) -> R + Send + 'static,
    R: Send + 'static,
  {
    let Pattern2 { a, b } = self;
    Plan {
      activate: Box::new(move |registry, mut downstream, on_deactivate, key| {
        let queue_a = registry.queue_for(&a);
        let queue_b = registry.queue_for(&b);
        let fire: Box<dyn FnMut(A, B) + Send> =
          Box::new(move |va, vb| downstream.next(combine(va, vb)));
        let plan: Arc<dyn ActivePlanLike> = Arc::new(ActivePlan2 {
          key,
          a: queue_a.clone(),
          b: queue_b.clone(),
          fire: Mutex::new(fire),
          on_deactivate,
          done: AtomicBool::new(false),
        });
        queue_a.attach_plan(plan.clone());
        if queue_b.id != queue_a.id {
          queue_b.attach_plan(plan.clone());
        }
        plan
      }),
    }
  }
}

impl<A, B, C, Err> Pattern3<A, B, C, Err>
where
  A: Send + 'static,
  B: Send + 'static,
  C: Send + 'static,
  Err: Send + 'static,
{
  pub fn then<R, F>(self, mut combine: F) -> Plan<R, Err>
  where
    F: FnMut(A, B, C) -> R + Send + 'static,
    R: Send + 'static,
  {
    let Pattern3 { a, b, c } = self;
    Plan {
      activate: Box::new(move |registry, mut downstream, on_deactivate, key| {
        let queue_a = registry.queue_for(&a);
        let queue_b = registry.queue_for(&b);
        let queue_c = registry.queue_for(&c);
        let fire: Box<dyn FnMut(A, B, C) + Send> =
          Box::new(move |va, vb, vc| downstream.next(combine(va, vb, vc)));
        let plan: Arc<dyn ActivePlanLike> = Arc::new(ActivePlan3 {
          key,
          a: queue_a.clone(),
          b: queue_b.clone(),
          c: queue_c.clone(),
          fire: Mutex::new(fire),
          on_deactivate,
          done: AtomicBool::new(false),
        });
        queue_a.attach_plan(plan.clone());
        if queue_b.id != queue_a.id {
          queue_b.attach_plan(plan.clone());
        }
        if queue_c.id != queue_a.id && queue_c.id != queue_b.id {
          queue_c.attach_plan(plan.clone());
        }
        plan
      }),
    }
  }
}

type Deactivate = Box<dyn Fn() + Send + Sync>;

type Activate<R, Err> = Box<
  dyn FnOnce(
      &mut JoinRegistry<Err>,
      BoxObserver<R, Err>,
      Deactivate,
      u64,
    ) -> Arc<dyn ActivePlanLike>
    + Send,
>;

/// A pattern bound to a combiner, ready to be activated by [`when`].
pub struct Plan<R, Err> {
  activate: Activate<R, Err>,
}

/// Activate `plans` against one downstream.
pub fn when<R, Err>(
  plans: impl IntoIterator<Item = Plan<R, Err>>,
) -> WhenObservable<R, Err> {
  WhenObservable { plans: plans.into_iter().collect() }
}

pub struct WhenObservable<R, Err> {
  plans: Vec<Plan<R, Err>>,
}

impl<R, Err> Observable for WhenObservable<R, Err>
where
  R: Send + 'static,
  Err: Send + 'static,
{
  type Item = R;
  type Err = Err;
  type Unsub = CompositeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<R, Err> + Send + 'static,
  {
    let shared = SharedObserver::new(observer);
    let gate = Arc::new(AsyncLock::new());
    let composite = CompositeSubscription::new();

    let on_error: Arc<dyn Fn(Err) + Send + Sync> = {
      let shared = shared.clone();
      let composite = composite.clone();
      Arc::new(move |err| {
        let mut downstream = shared.clone();
        downstream.error(err);
        let mut composite = composite.clone();
        composite.unsubscribe();
      })
    };
    let mut registry = JoinRegistry {
      gate: gate.clone(),
      on_error,
      composite: composite.clone(),
      entries: HashMap::new(),
      pending: Vec::new(),
    };

    let active: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    if self.plans.is_empty() {
      let mut downstream = shared;
      downstream.complete();
      return composite;
    }
    for plan in self.plans {
      let key = NEXT_PLAN_KEY.fetch_add(1, Ordering::Relaxed);
      active.lock().unwrap().push(key);
      let on_deactivate: Deactivate = {
        let active = active.clone();
        let shared = shared.clone();
        let composite = composite.clone();
        Box::new(move || {
          let none_left = {
            let mut active = active.lock().unwrap();
            active.retain(|k| *k != key);
            active.is_empty()
          };
          if none_left {
            let mut downstream = shared.clone();
            downstream.complete();
            let mut composite = composite.clone();
            composite.unsubscribe();
          }
        })
      };
      let downstream: BoxObserver<R, Err> = Box::new(shared.clone());
      (plan.activate)(&mut registry, downstream, on_deactivate, key);
    }

    // Break plan/queue reference cycles if the consumer walks away early.
    let queues: Vec<Arc<JoinQueue>> =
      registry.entries.values().cloned().collect();
    composite.add(ActionSubscription::new(move || {
      for queue in &queues {
        queue.clear_plans();
      }
    }));

    // Subscribe upstreams only after every plan is attached, so no arrival
    // can race plan registration.
    for subscribe in registry.pending {
      subscribe();
    }
    composite
  }
}

// ============================================================================
// Engine internals
// ============================================================================

enum JoinEvent {
  Value(Box<dyn Any + Send>),
  Complete,
}

/// The shared per-source FIFO queue plus the plans listening on it.
struct JoinQueue {
  id: u64,
  events: Mutex<VecDeque<JoinEvent>>,
  plans: Mutex<Vec<Arc<dyn ActivePlanLike>>>,
}

impl JoinQueue {
  fn new(id: u64) -> Self {
    JoinQueue {
      id,
      events: Mutex::new(VecDeque::new()),
      plans: Mutex::new(Vec::new()),
    }
  }

  fn attach_plan(&self, plan: Arc<dyn ActivePlanLike>) {
    self.plans.lock().unwrap().push(plan);
  }

  fn detach_plan(&self, key: u64) {
    self.plans.lock().unwrap().retain(|p| p.key() != key);
  }

  fn clear_plans(&self) { self.plans.lock().unwrap().clear(); }

  /// `Some(true)` if the event at `index` is a completion marker.
  fn is_complete_at(&self, index: usize) -> Option<bool> {
    self
      .events
      .lock()
      .unwrap()
      .get(index)
      .map(|event| matches!(event, JoinEvent::Complete))
  }

  fn pop_value<T: 'static>(&self) -> T {
    let event = self.events.lock().unwrap().pop_front();
    match event {
      Some(JoinEvent::Value(value)) => *value
        .downcast::<T>()
        .expect("join queue holds its source's item type"),
      _ => panic!("join queue front is not a value"),
    }
  }

  /// Push an event and give every listening plan a chance to match. Runs
  /// under the gate.
  fn arrive(&self, event: JoinEvent) {
    self.events.lock().unwrap().push_back(event);
    let plans: Vec<_> = self.plans.lock().unwrap().clone();
    for plan in plans {
      plan.try_match();
    }
  }
}

/// Adapter subscribed to one upstream source; funnels everything through
/// the gate into the shared queue.
struct JoinUpstream<Item, Err> {
  queue: Arc<JoinQueue>,
  gate: Arc<AsyncLock>,
  on_error: Arc<dyn Fn(Err) + Send + Sync>,
  _item: std::marker::PhantomData<fn(Item)>,
}

impl<Item, Err> Observer<Item, Err> for JoinUpstream<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, value: Item) {
    let queue = self.queue.clone();
    self.gate.wait(move || {
      queue.arrive(JoinEvent::Value(Box::new(value)));
    });
  }

  fn error(&mut self, err: Err) {
    let on_error = self.on_error.clone();
    self.gate.wait(move || on_error(err));
  }

  fn complete(&mut self) {
    let queue = self.queue.clone();
    self.gate.wait(move || queue.arrive(JoinEvent::Complete));
  }

  fn is_closed(&self) -> bool { false }
}

struct JoinRegistry<Err> {
  gate: Arc<AsyncLock>,
  on_error: Arc<dyn Fn(Err) + Send + Sync>,
  composite: CompositeSubscription,
  entries: HashMap<u64, Arc<JoinQueue>>,
  pending: Vec<Box<dyn FnOnce() + Send>>,
}

impl<Err: Send + 'static> JoinRegistry<Err> {
  /// The queue for `source`, creating it (and deferring its upstream
  /// subscription) on first sight of the id.
  fn queue_for<Item: Send + 'static>(
    &mut self,
    source: &JoinSource<Item, Err>,
  ) -> Arc<JoinQueue> {
    if let Some(queue) = self.entries.get(&source.id) {
      return queue.clone();
    }
    let queue = Arc::new(JoinQueue::new(source.id));
    self.entries.insert(source.id, queue.clone());

    let slot = SingleAssignmentSubscription::new();
    self.composite.add(slot.clone());
    let upstream = JoinUpstream {
      queue: queue.clone(),
      gate: self.gate.clone(),
      on_error: self.on_error.clone(),
      _item: std::marker::PhantomData,
    };
    let observable = source.source.clone();
    self
      .pending
      .push(Box::new(move || slot.set(observable.actual_subscribe(upstream))));
    queue
  }
}

trait ActivePlanLike: Send + Sync {
  fn key(&self) -> u64;

  /// Attempt one match. Runs under the gate.
  fn try_match(&self);
}

struct ActivePlan2<A, B> {
  key: u64,
  a: Arc<JoinQueue>,
  b: Arc<JoinQueue>,
  fire: Mutex<Box<dyn FnMut(A, B) + Send>>,
  on_deactivate: Deactivate,
  done: AtomicBool,
}

impl<A, B> ActivePlan2<A, B> {
  fn deactivate(&self) {
    self.done.store(true, Ordering::SeqCst);
    self.a.detach_plan(self.key);
    self.b.detach_plan(self.key);
    (self.on_deactivate)();
  }
}

impl<A, B> ActivePlanLike for ActivePlan2<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  fn key(&self) -> u64 { self.key }

  fn try_match(&self) {
    if self.done.load(Ordering::SeqCst) {
      return;
    }
    // When both ends share one source, this plan needs two queued values;
    // a shared id implies a shared queue, hence index 1 for the second end.
    let index_b = usize::from(self.b.id == self.a.id);
    match (self.a.is_complete_at(0), self.b.is_complete_at(index_b)) {
      (Some(true), _) | (_, Some(true)) => self.deactivate(),
      (Some(false), Some(false)) => {
        let va: A = self.a.pop_value();
        let vb: B = self.b.pop_value();
        (self.fire.lock().unwrap())(va, vb);
      }
      _ => {}
    }
  }
}

struct ActivePlan3<A, B, C> {
  key: u64,
  a: Arc<JoinQueue>,
  b: Arc<JoinQueue>,
  c: Arc<JoinQueue>,
  fire: Mutex<Box<dyn FnMut(A, B, C) + Send>>,
  on_deactivate: Deactivate,
  done: AtomicBool,
}

impl<A, B, C> ActivePlan3<A, B, C> {
  fn deactivate(&self) {
    self.done.store(true, Ordering::SeqCst);
    self.a.detach_plan(self.key);
    self.b.detach_plan(self.key);
    self.c.detach_plan(self.key);
    (self.on_deactivate)();
  }
}

impl<A, B, C> ActivePlanLike for ActivePlan3<A, B, C>
where
  A: Send + 'static,
  B: Send + 'static,
  C: Send + 'static,
{
  fn key(&self) -> u64 { self.key }

  fn try_match(&self) {
    if self.done.load(Ordering::SeqCst) {
      return;
    }
    // Index per end: how many earlier ends draw from the same queue.
    let index_b = usize::from(self.b.id == self.a.id);
    let index_c = usize::from(self.c.id == self.a.id)
      + usize::from(self.c.id == self.b.id);
    let heads = (
      self.a.is_complete_at(0),
      self.b.is_complete_at(index_b),
      self.c.is_complete_at(index_c),
    );
    match heads {
      (Some(true), _, _) | (_, Some(true), _) | (_, _, Some(true)) => {
        self.deactivate()
      }
      (Some(false), Some(false), Some(false)) => {
        // Pop in end order; aliased queues shift so the next end's value
        // is at the front by the time it pops.
        let va: A = self.a.pop_value();
        let vb: B = self.b.pop_value();
        let vc: C = self.c.pop_value();
        (self.fire.lock().unwrap())(va, vb, vc);
      }
      _ => {}
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::subject::Subject;
  use std::sync::{Arc, Mutex};

  #[test]
  fn pairs_one_value_from_each_source() {
    let left = Subject::<i32, ()>::new();
    let right = Subject::<&'static str, ()>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _subscription =
      when([left.clone().and(right.clone()).then(|n, tag| (n, tag))])
        .subscribe(move |pair| s.lock().unwrap().push(pair));

    let mut left_in = left;
    let mut right_in = right;
    left_in.next(1);
    left_in.next(2);
    right_in.next("a");
    right_in.next("b");
    assert_eq!(*seen.lock().unwrap(), vec![(1, "a"), (2, "b")]);
  }

  #[test]
  fn competing_plans_consume_exclusively() {
    let shared = Subject::<i32, ()>::new();
    let left = Subject::<i32, ()>::new();
    let right = Subject::<i32, ()>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();

    let shared_source = JoinSource::new(shared.clone());
    let plan_left = Pattern2::new(
      shared_source.clone(),
      JoinSource::new(left.clone()),
    )
    .then(|v, l| ("left", v + l));
    let plan_right = Pattern2::new(
      shared_source,
      JoinSource::new(right.clone()),
    )
    .then(|v, r| ("right", v + r));

    let _subscription = when([plan_left, plan_right])
      .subscribe(move |out| s.lock().unwrap().push(out));

    let mut shared_in = shared;
    let mut left_in = left;
    let mut right_in = right;
    shared_in.next(10);
    left_in.next(1); // consumes the 10
    right_in.next(2); // nothing left to pair with
    assert_eq!(*seen.lock().unwrap(), vec![("left", 11)]);
    shared_in.next(20);
    assert_eq!(*seen.lock().unwrap(), vec![("left", 11), ("right", 22)]);
  }

  #[test]
  fn triple_pattern_combines_three_sources() {
    let a = Subject::<i32, ()>::new();
    let b = Subject::<i32, ()>::new();
    let c = Subject::<i32, ()>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _subscription = when([a
      .clone()
      .and(b.clone())
      .and(c.clone())
      .then(|x, y, z| x + y + z)])
    .subscribe(move |v| s.lock().unwrap().push(v));

    let mut a_in = a;
    let mut b_in = b;
    let mut c_in = c;
    a_in.next(1);
    b_in.next(2);
    assert!(seen.lock().unwrap().is_empty());
    c_in.next(3);
    assert_eq!(*seen.lock().unwrap(), vec![6]);
  }

  #[test]
  fn same_source_twice_needs_two_values() {
    let numbers = Subject::<i32, ()>::new();
    let source = JoinSource::new(numbers.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _subscription =
      when([Pattern2::new(source.clone(), source).then(|x, y| (x, y))])
        .subscribe(move |pair| s.lock().unwrap().push(pair));

    let mut numbers_in = numbers;
    numbers_in.next(1);
    assert!(seen.lock().unwrap().is_empty());
    numbers_in.next(2);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 2)]);
  }

  #[test]
  fn completes_when_every_plan_deactivates() {
    let left = Subject::<i32, ()>::new();
    let right = Subject::<i32, ()>::new();
    let completions = Arc::new(Mutex::new(0));
    let c = completions.clone();
    let _subscription =
      when([left.clone().and(right.clone()).then(|x, y| x + y)])
        .subscribe_all(|_| {}, |_| {}, move || *c.lock().unwrap() += 1);

    let mut left_in = left;
    left_in.complete();
    assert_eq!(*completions.lock().unwrap(), 1);
  }

  #[test]
  fn source_error_fails_the_join() {
    let left = Subject::<i32, &'static str>::new();
    let right = Subject::<i32, &'static str>::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = errors.clone();
    let _subscription =
      when([left.clone().and(right.clone()).then(|x, y| x + y)])
        .subscribe_all(
          |_| {},
          move |err| e.lock().unwrap().push(err),
          || {},
        );
    let mut right_in = right;
    right_in.error("join input failed");
    assert_eq!(*errors.lock().unwrap(), vec!["join input failed"]);
    assert_eq!(left.subscriber_count(), 0);
  }
}
