mod cluster;
mod deps;
mod group;

pub use cluster::{cluster_block, cluster_graph, ClusterPlan};
pub use deps::BlockDeps;
pub use group::{FusionGroup, GroupId};
