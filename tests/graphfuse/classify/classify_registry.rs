use anyhow::Result;
use graphfuse::{
    op_def, Arity, DType, FusionConfig, Graph, Node, NodeKind, OpRegistry, OpSupport,
    SupportClassifier, ValueType,
};

use crate::common::{self, f32_tensor, op, out};

struct AcceptAll;

impl OpSupport for AcceptAll {
    fn supports(&self, _graph: &Graph, _node: &Node) -> bool {
        true
    }
}

#[test]
fn registry_knows_its_ops() {
    let add = op_def("aten::add").expect("aten::add registered");
    assert_eq!(add.inputs, Arity::Fixed(2));
    assert!(op_def("aten::cat").is_some_and(|def| def.inputs.accepts(5)));
    assert!(op_def("aten::nonzero").is_none());
}

#[test]
fn unknown_ops_are_ineligible() -> Result<()> {
    let chain = common::chain("aten::nonzero")?;
    let classifier = SupportClassifier::new(&FusionConfig::default());
    let verdicts = chain
        .nodes
        .iter()
        .map(|node| classifier.is_eligible(&chain.graph, *node))
        .collect::<Vec<_>>();
    assert_eq!(verdicts, vec![true, true, false, true, true]);
    Ok(())
}

#[test]
fn deny_list_overrides_support() -> Result<()> {
    let chain = common::chain("aten::neg")?;
    let config = FusionConfig::default().deny("aten::neg");
    let classifier = SupportClassifier::with_support(AcceptAll, &config);
    assert!(!classifier.is_eligible(&chain.graph, chain.nodes[1]));
    assert!(!classifier.is_eligible(&chain.graph, chain.nodes[2]));
    assert!(classifier.is_eligible(&chain.graph, chain.nodes[0]));
    Ok(())
}

#[test]
fn classification_is_idempotent() -> Result<()> {
    let chain = common::chain("aten::nonzero")?;
    let classifier = SupportClassifier::new(&FusionConfig::default());
    let root = chain.graph.root();
    let first = classifier.classify_block(&chain.graph, root)?;
    let second = classifier.classify_block(&chain.graph, root)?;
    assert_eq!(first.eligible, second.eligible);
    assert_eq!(first.ineligible, second.ineligible);
    for node in &chain.nodes {
        let verdict = classifier.is_eligible(&chain.graph, *node);
        assert_eq!(verdict, classifier.is_eligible(&chain.graph, *node));
        assert_eq!(verdict, first.is_eligible(*node));
    }
    Ok(())
}

#[test]
fn control_flow_is_never_eligible() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_param(root, f32_tensor(&[2]))?;
    let lp = g.append_node(root, NodeKind::Loop, vec![], vec![])?;
    let body = g.add_block(lp)?;
    op(&mut g, body, "aten::relu", &[x])?;

    let classifier = SupportClassifier::with_support(AcceptAll, &FusionConfig::default());
    let classification = classifier.classify_block(&g, root)?;
    assert!(!classification.is_eligible(lp));
    assert_eq!(classification.ineligible, vec![lp]);
    assert!(!OpRegistry.supports(&g, g.node(lp)?));
    Ok(())
}

#[test]
fn dtype_and_arity_are_checked() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let ints = g.add_param(root, ValueType::tensor(DType::I64, &[4]))?;
    let floats = g.add_param(root, f32_tensor(&[4]))?;
    let gelu_int = op(&mut g, root, "aten::gelu", &[ints])?;
    let gelu_float = op(&mut g, root, "aten::gelu", &[floats])?;
    let add_one = op(&mut g, root, "aten::add", &[floats])?;

    let classifier = SupportClassifier::new(&FusionConfig::default());
    assert!(!classifier.is_eligible(&g, gelu_int));
    assert!(classifier.is_eligible(&g, gelu_float));
    assert!(!classifier.is_eligible(&g, add_one));
    Ok(())
}

#[test]
fn zero_sized_concat_is_eligible() -> Result<()> {
    for empty in [0usize, 3] {
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_param(root, f32_tensor(&[2, 1, 4, 4]))?;
        let b = g.add_param(root, f32_tensor(&[2, 2, 4, 4]))?;
        let c = g.add_param(root, f32_tensor(&[2, empty, 4, 4]))?;
        let cat = g.append_node(
            root,
            NodeKind::op("aten::cat"),
            vec![a, b, c],
            vec![f32_tensor(&[2, 3 + empty, 4, 4])],
        )?;
        g.set_returns(root, vec![out(&g, cat)?])?;

        let classifier = SupportClassifier::new(&FusionConfig::default());
        assert!(classifier.is_eligible(&g, cat), "dim {}", empty);
    }
    Ok(())
}

#[test]
fn missing_node_is_not_eligible() -> Result<()> {
    let chain = common::chain("aten::neg")?;
    let classifier = SupportClassifier::new(&FusionConfig::default());
    assert!(!classifier.is_eligible(&chain.graph, graphfuse::NodeId(999)));
    Ok(())
}
