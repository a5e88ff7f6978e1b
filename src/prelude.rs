pub use crate::async_lock::AsyncLock;
pub use crate::observable;
pub use crate::observable::{
  BoxedCloneObservable, BoxedObservable, Observable,
};
pub use crate::observer::{
  BoxObserver, CheckedObserver, Notification, Observer, SharedObserver,
};
pub use crate::ops::catch::catch_sequence;
pub use crate::ops::join::{when, JoinSource, Pattern2, Pattern3, Plan};
pub use crate::scheduler::{
  default_pool, Duration, ImmediateScheduler, Instant, PoolScheduler,
  Scheduler, TaskHandle,
};
pub use crate::subject::Subject;
pub use crate::subscription::{
  ActionSubscription, BoxSubscription, CompositeSubscription,
  NopSubscription, SerialSubscription, SingleAssignmentSubscription,
  StableCompositeSubscription, SubscriptionGuard, SubscriptionLike,
};
