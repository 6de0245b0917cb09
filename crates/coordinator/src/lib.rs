pub mod key_range;
pub mod planner;

pub use key_range::{KeyRangeGenerator, ModuloKeyRange};
pub use planner::{Partition, PartitionPlanner};
