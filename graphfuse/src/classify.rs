use std::collections::{BTreeSet, HashSet};

use anyhow::Result;

use crate::config::FusionConfig;
use crate::graph::{BlockId, Graph, NodeId};
use crate::registry::{OpRegistry, OpSupport};

/// Decides per node whether it may be offloaded.
///
/// Eligibility is the capability predicate minus the deny-list; a deny-listed
/// kind is rejected even when the predicate accepts it.
pub struct SupportClassifier {
    support: Box<dyn OpSupport>,
    deny_list: BTreeSet<String>,
}

/// Eligibility snapshot for the nodes of one block.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub eligible: HashSet<NodeId>,
    pub ineligible: Vec<NodeId>,
}

impl Classification {
    pub fn is_eligible(&self, node: NodeId) -> bool {
        self.eligible.contains(&node)
    }
}

impl SupportClassifier {
    /// Classifier backed by the static op registry.
    pub fn new(config: &FusionConfig) -> Self {
        Self::with_support(OpRegistry, config)
    }

    pub fn with_support(support: impl OpSupport + 'static, config: &FusionConfig) -> Self {
        Self {
            support: Box::new(support),
            deny_list: config.deny_list.clone(),
        }
    }

    pub fn is_denied(&self, kind: &str) -> bool {
        self.deny_list.contains(kind)
    }

    /// Total: unknown nodes are simply not eligible.
    pub fn is_eligible(&self, graph: &Graph, node: NodeId) -> bool {
        let Ok(node) = graph.node(node) else {
            return false;
        };
        !self.is_denied(node.kind.name()) && self.support.supports(graph, node)
    }

    /// Classify every node directly inside `block`.
    ///
    /// Nodes owning nested blocks are always boundaries.
    pub fn classify_block(&self, graph: &Graph, block: BlockId) -> Result<Classification> {
        let mut classification = Classification::default();
        for id in &graph.block(block)?.nodes {
            let node = graph.node(*id)?;
            if node.blocks.is_empty() && self.is_eligible(graph, *id) {
                classification.eligible.insert(*id);
            } else {
                classification.ineligible.push(*id);
            }
        }
        Ok(classification)
    }
}
