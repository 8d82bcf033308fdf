//! The indexing pipeline: dependency queue, event fan-out, and the indexer
//! itself.

pub mod error;
pub mod events;
pub mod indexer;
pub mod queue;

pub use error::IndexError;
pub use events::ApplicationListener;
pub use indexer::Indexer;
pub use queue::DependencyQueue;
