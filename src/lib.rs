//! rxcore is the concurrency and resource-lifecycle core of a push-stream
//! library: the observer notification contract, composable cancellation
//! handles, a queue-based async lock, pluggable schedulers, and the
//! combinators that coordinate concurrent streams (merge, switch, zip,
//! observe_on, delay, sample, catch, retry and join patterns).
//!
//! ```
//! use rxcore::prelude::*;
//!
//! let fast = observable::from_iter::<_, ()>(0..3);
//! let slow = observable::from_iter::<_, ()>(10..13);
//! fast
//!   .merge(slow)
//!   .subscribe_all(
//!     |v| println!("got {}", v),
//!     |_| {},
//!     || println!("both done"),
//!   );
//! ```

pub mod async_lock;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod scheduler;
pub mod subject;
pub mod subscription;

pub mod prelude;

pub use async_lock::AsyncLock;
pub use observable::Observable;
pub use observer::Observer;
pub use subject::Subject;
pub use subscription::SubscriptionLike;
