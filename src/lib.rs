//! A Tokio-based pool that runs submitted workers concurrently and gathers
//! their results through a single completion stream per batch.

mod args;
mod batch;
mod conduit;
mod error;
mod options;
mod pool;
mod results;

pub use args::{Arg, Args};
pub use batch::PoolPhase;
pub use error::{ArgError, PoolError};
pub use options::{PoolOptions, DEFAULT_POOL_NAME};
pub use pool::GatherPool;
pub use results::Results;
