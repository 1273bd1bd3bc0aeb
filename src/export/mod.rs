//! The concurrent, range-partitioned export engine
//!
//! - [`plan`] - partition planning over the row-offset space
//! - [`worker`] - one shard exporter thread per partition
//! - [`coordinator`] - fan-out/join orchestration and job lifecycle

pub mod coordinator;
pub mod plan;
pub mod worker;

pub use coordinator::{ExportCoordinator, ExportJob, ExportResult};
pub use plan::{clamp_shard_count, plan, Partition};
pub use worker::{ShardExporter, ShardStats};
