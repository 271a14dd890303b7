use anyhow::Result;
use graphfuse::{
    cluster_graph, optimize_module, FusionConfig, Graph, GroupId, Module, NodeKind,
    SupportClassifier,
};

use crate::common::{self, f32_tensor, member_sets, op, out};

#[test]
fn loop_body_is_clustered_before_its_owner() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_param(root, f32_tensor(&[2, 3]))?;
    let relu = op(&mut g, root, "aten::relu", &[x])?;
    let lp = g.append_node(root, NodeKind::Loop, vec![], vec![f32_tensor(&[2, 3])])?;
    let body = g.add_block(lp)?;
    let relu_out = out(&g, relu)?;
    let b0 = op(&mut g, body, "aten::neg", &[relu_out])?;
    let b0_out = out(&g, b0)?;
    let b1 = op(&mut g, body, "aten::abs", &[b0_out])?;
    g.set_returns(body, vec![out(&g, b1)?])?;
    let lp_out = out(&g, lp)?;
    let add = op(&mut g, root, "aten::add", &[relu_out, lp_out])?;
    g.set_returns(root, vec![out(&g, add)?])?;

    let config = FusionConfig::default();
    let plan = cluster_graph(&g, &SupportClassifier::new(&config), &config)?;

    assert_eq!(plan.blocks(), &[body, root]);
    assert_eq!(member_sets(plan.groups_in(body)), vec![vec![b0, b1]]);
    // relu feeds the loop body, which feeds add: merging them would be cyclic.
    assert_eq!(member_sets(plan.groups_in(root)), vec![vec![relu], vec![add]]);
    let ids = plan.groups().map(|group| group.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![GroupId(0), GroupId(1), GroupId(2)]);
    assert_eq!(plan.groups_in(body)[0].inputs, vec![out(&g, relu)?]);
    assert!(plan.groups().all(|group| !group.contains(lp)));
    Ok(())
}

#[test]
fn branches_are_clustered_independently() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_param(root, f32_tensor(&[4]))?;
    let cond = g.add_param(root, graphfuse::ValueType::Bool)?;
    let branch = g.append_node(root, NodeKind::If, vec![cond], vec![f32_tensor(&[4])])?;
    let then_block = g.add_block(branch)?;
    let else_block = g.add_block(branch)?;
    let t0 = op(&mut g, then_block, "aten::relu", &[x])?;
    let t0_out = out(&g, t0)?;
    let t1 = op(&mut g, then_block, "aten::exp", &[t0_out])?;
    g.set_returns(then_block, vec![out(&g, t1)?])?;
    let e0 = op(&mut g, else_block, "aten::sigmoid", &[x])?;
    let e0_out = out(&g, e0)?;
    let e1 = op(&mut g, else_block, "aten::neg", &[e0_out])?;
    g.set_returns(else_block, vec![out(&g, e1)?])?;
    g.set_returns(root, vec![out(&g, branch)?])?;

    let config = FusionConfig::default();
    let plan = cluster_graph(&g, &SupportClassifier::new(&config), &config)?;

    assert_eq!(member_sets(plan.groups_in(then_block)), vec![vec![t0, t1]]);
    assert_eq!(member_sets(plan.groups_in(else_block)), vec![vec![e0, e1]]);
    assert!(plan.groups_in(root).is_empty());
    for group in plan.groups() {
        for node in &group.nodes {
            assert_eq!(g.node(*node)?.owner, group.block);
        }
    }
    Ok(())
}

#[test]
fn zero_sized_concat_clusters_like_any_other() -> Result<()> {
    let mut shapes = Vec::new();
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
        let cat_out = out(&g, cat)?;
        let relu = op(&mut g, root, "aten::relu", &[cat_out])?;
        g.set_returns(root, vec![out(&g, relu)?])?;

        let config = FusionConfig::default();
        let plan = cluster_graph(&g, &SupportClassifier::new(&config), &config)?;
        assert_eq!(member_sets(plan.groups_in(root)), vec![vec![cat, relu]]);
        let group = &plan.groups_in(root)[0];
        shapes.push((group.len(), group.inputs.len(), group.outputs.len()));
    }
    assert_eq!(shapes[0], shapes[1]);
    Ok(())
}

#[test]
fn deeply_nested_loops_are_optimized() -> Result<()> {
    let nested = common::nested_loops(3000)?;
    let mut module = Module::new(nested.graph);
    let config = FusionConfig::default();

    let report = optimize_module(&mut module, &config, &common::always_ok)?;

    assert_eq!(report.converted_count(), 1);
    let g = module.graph();
    assert!(!g.contains_node(nested.relu));
    let calls = common::nodes_of_kind(g, "engine::call");
    assert_eq!(calls.len(), 1);
    assert_eq!(g.node(calls[0])?.owner, nested.innermost);
    Ok(())
}
