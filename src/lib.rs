mod batch_function;
mod cache;
mod error;
mod loader;
mod loader_op;
mod loader_worker;
mod options;
#[cfg(feature = "stats")]
mod worker_stats;

pub mod config;

pub use batch_function::BatchFunction;
pub use cache::Cache;
pub use error::{LoadError, LoadResult};
pub use loader::Loader;
pub use options::LoaderOptions;
