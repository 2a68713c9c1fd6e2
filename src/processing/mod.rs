//! Processing side: the single queue consumer and the periodic aggregation
//! loop. Both mutate per-drone state only under the registry's per-drone
//! lock.

pub mod aggregator;
pub mod worker;

pub use aggregator::Aggregator;
pub use worker::Worker;
