use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;

use crate::classify::{Classification, SupportClassifier};
use crate::config::FusionConfig;
use crate::graph::{BlockId, Graph, NodeId};

use super::deps::BlockDeps;
use super::group::{FusionGroup, GroupId};

/// Fusion groups of a whole graph, cached per block.
#[derive(Debug, Clone, Default)]
pub struct ClusterPlan {
    order: Vec<BlockId>,
    groups: BTreeMap<BlockId, Vec<FusionGroup>>,
}

impl ClusterPlan {
    /// Groups of one block in anchor order.
    pub fn groups_in(&self, block: BlockId) -> &[FusionGroup] {
        self.groups.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All groups, nested blocks before the blocks that own them.
    pub fn groups(&self) -> impl Iterator<Item = &FusionGroup> + '_ {
        self.order.iter().flat_map(move |block| self.groups_in(*block))
    }

    /// Blocks in the order they were clustered.
    pub fn blocks(&self) -> &[BlockId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cluster every block of `graph`, innermost blocks first.
pub fn cluster_graph(
    graph: &Graph,
    classifier: &SupportClassifier,
    config: &FusionConfig,
) -> Result<ClusterPlan> {
    let mut plan = ClusterPlan::default();
    let mut next_id = 0usize;
    for block in graph.blocks_post_order() {
        let classification = classifier.classify_block(graph, block)?;
        let mut groups = Vec::new();
        for members in cluster_block(graph, block, &classification)? {
            if members.len() < config.min_group_size {
                crate::trace!(
                    "fusion.skip {} size={} below min={}",
                    block,
                    members.len(),
                    config.min_group_size
                );
                continue;
            }
            let group = FusionGroup::new(graph, GroupId(next_id), block, members)?;
            next_id += 1;
            crate::trace!(
                "fusion.group {} {} size={} inputs={} outputs={}",
                group.id,
                block,
                group.len(),
                group.inputs.len(),
                group.outputs.len()
            );
            groups.push(group);
        }
        plan.order.push(block);
        plan.groups.insert(block, groups);
    }
    Ok(plan)
}

/// Merge the eligible nodes of one block into candidate groups.
///
/// Two eligible nodes join when one directly feeds the other; ineligible
/// nodes never connect groups. A merge is refused when some path would leave
/// the merged set and come back into it, counting every group formed so far
/// as a single node, so the groups of a block can all be collapsed at once
/// without creating a cycle. Groups come back in the order of
/// their earliest member, members in block order.
pub fn cluster_block(
    graph: &Graph,
    block: BlockId,
    classification: &Classification,
) -> Result<Vec<Vec<NodeId>>> {
    let deps = BlockDeps::build(graph, block)?;
    let mut group_of: HashMap<NodeId, usize> = HashMap::new();
    let mut groups: Vec<Vec<NodeId>> = Vec::new();

    for id in &graph.block(block)?.nodes {
        if !classification.is_eligible(*id) {
            continue;
        }
        let mut current = groups.len();
        groups.push(vec![*id]);
        group_of.insert(*id, current);

        for input in &graph.node(*id)?.inputs {
            let Some(producer) = graph.producer_node(*input)? else {
                continue;
            };
            let Some(&other) = group_of.get(&producer) else {
                continue;
            };
            if other == current {
                continue;
            }
            let merged = groups[other]
                .iter()
                .chain(groups[current].iter())
                .copied()
                .collect::<HashSet<_>>();
            let peers = |node: NodeId| {
                group_of
                    .get(&node)
                    .map(|group| groups[*group].as_slice())
                    .unwrap_or(&[])
            };
            if deps.reaches_back_contracted(&merged, peers) {
                crate::trace!("fusion.refuse {} -> {}: path leaves the group", producer, id);
                continue;
            }
            let (keep, drop) = (other.min(current), other.max(current));
            let moved = std::mem::take(&mut groups[drop]);
            for node in &moved {
                group_of.insert(*node, keep);
            }
            groups[keep].extend(moved);
            current = keep;
        }
    }

    let mut groups = groups
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|mut group| {
            group.sort_by_key(|node| deps.position(*node));
            group
        })
        .collect::<Vec<_>>();
    groups.sort_by_key(|group| deps.position(group[0]));
    Ok(groups)
}
