//! Crosscheck provides the `Experiment` struct, which runs a trusted *control*
//! implementation and a new *candidate* implementation of the same operation,
//! compares what they produced and publishes an [`Observation`] about it. The
//! caller only ever sees the control's result.
//!
//! Say a service reads user records from a database through
//! `load_data_from_db`, and a port to redis, `load_data_from_redis`, is ready.
//! The DB stays the source of truth while the redis path runs alongside it on
//! real traffic, and every run reports whether the two agreed and how long
//! each took.
//!
//! ```
//! use crosscheck::{publisher::ChannelPublisher, Experiment};
//!
//! async fn load_data_from_db(id: i32) -> Result<i32, String> { Ok(id) }
//! async fn load_data_from_redis(id: i32) -> Result<i32, String> { Ok(id) }
//!
//! # tokio_test::block_on(async {
//! let (publisher, mut observations) = ChannelPublisher::new();
//! let id = 4;
//!
//! let result = Experiment::new("redis migration")
//!     .control(load_data_from_db(id))
//!     .candidate(load_data_from_redis(id))
//!     .publisher(publisher)
//!     .run()
//!     .await;
//!
//! // the value always comes from the DB
//! assert_eq!(result, Ok(4));
//!
//! let observation = observations.recv().await.unwrap();
//! assert!(observation.matched());
//! # });
//! ```
//!
//! The two sides run one after the other, never concurrently, in an order
//! drawn at random for every run. Errors and panics from the candidate are
//! recorded in the observation and otherwise dropped. Publishing happens on a
//! detached task, so a slow or failing [`Publisher`] never delays or breaks the
//! caller.

pub mod comparator;
pub mod error;
pub mod experiment;
pub mod observation;
pub mod order;
pub mod publisher;
pub mod side;

pub use comparator::Comparator;
pub use error::PublishError;
pub use experiment::Experiment;
pub use observation::{Observation, Verdict};
pub use order::{ExecutionOrder, OrderStrategy};
pub use publisher::Publisher;
