use anyhow::Result;
use graphfuse::{AttrValue, Graph, NodeKind, OpAttrs, Use};

use crate::common::{self, f32_tensor, op, out};

#[test]
fn uses_cover_nodes_nested_blocks_and_returns() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_param(root, f32_tensor(&[2, 3]))?;
    let relu = op(&mut g, root, "aten::relu", &[x])?;
    let r = out(&g, relu)?;
    let lp = g.append_node(root, NodeKind::Loop, vec![], vec![f32_tensor(&[2, 3])])?;
    let body = g.add_block(lp)?;
    let inner = op(&mut g, body, "aten::neg", &[r])?;
    g.set_returns(body, vec![out(&g, inner)?])?;
    g.set_returns(root, vec![r, out(&g, lp)?])?;

    let uses = g.uses(r);
    assert_eq!(uses.len(), 2);
    assert!(uses.contains(&Use::Node {
        node: inner,
        index: 0
    }));
    assert!(uses.contains(&Use::Return {
        block: root,
        index: 0
    }));
    assert_eq!(g.enclosing_node_in(inner, root), Some(lp));
    assert!(g.is_ancestor_block(root, body));
    assert!(!g.is_ancestor_block(body, root));
    g.validate()?;
    Ok(())
}

#[test]
fn replace_all_uses_reaches_nested_consumers() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_param(root, f32_tensor(&[2, 3]))?;
    let a = op(&mut g, root, "aten::relu", &[x])?;
    let b = op(&mut g, root, "aten::abs", &[x])?;
    let lp = g.append_node(root, NodeKind::Loop, vec![], vec![])?;
    let body = g.add_block(lp)?;
    let a_out = out(&g, a)?;
    let inner = op(&mut g, body, "aten::neg", &[a_out])?;
    g.set_returns(root, vec![out(&g, a)?])?;

    g.replace_all_uses_with(out(&g, a)?, out(&g, b)?)?;
    assert!(g.uses(out(&g, a)?).is_empty());
    assert_eq!(g.node(inner)?.inputs, vec![out(&g, b)?]);
    assert_eq!(g.block(root)?.returns, vec![out(&g, b)?]);
    g.remove_node(a)?;
    assert!(!g.contains_node(a));
    g.validate()?;
    Ok(())
}

#[test]
fn remove_node_refuses_live_outputs() -> Result<()> {
    let chain = common::chain("aten::neg")?;
    let mut g = chain.graph;
    let err = g.remove_node(chain.nodes[0]).unwrap_err();
    assert!(err.to_string().contains("still in use"));
    assert!(g.contains_node(chain.nodes[0]));
    Ok(())
}

#[test]
fn removing_control_flow_drops_nested_blocks() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let cond = g.append_node(
        root,
        NodeKind::Constant {
            value: AttrValue::Bool(true),
        },
        vec![],
        vec![graphfuse::ValueType::Bool],
    )?;
    let branch = g.append_node(root, NodeKind::If, vec![out(&g, cond)?], vec![])?;
    let then_block = g.add_block(branch)?;
    let else_block = g.add_block(branch)?;
    let p = g.add_param(then_block, f32_tensor(&[1]))?;
    op(&mut g, then_block, "aten::relu", &[p])?;

    g.remove_node(branch)?;
    assert_eq!(g.node_count(), 1);
    assert!(g.block(then_block).is_err());
    assert!(g.block(else_block).is_err());
    g.validate()?;
    Ok(())
}

#[test]
fn post_order_lists_nested_blocks_first() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let outer = g.append_node(root, NodeKind::Loop, vec![], vec![])?;
    let outer_body = g.add_block(outer)?;
    let inner = g.append_node(outer_body, NodeKind::Loop, vec![], vec![])?;
    let inner_body = g.add_block(inner)?;
    let branch = g.append_node(root, NodeKind::If, vec![], vec![])?;
    let then_block = g.add_block(branch)?;
    let else_block = g.add_block(branch)?;

    assert_eq!(
        g.blocks_post_order(),
        vec![inner_body, outer_body, then_block, else_block, root]
    );
    Ok(())
}

#[test]
fn reorder_requires_a_permutation() -> Result<()> {
    let chain = common::chain("aten::neg")?;
    let mut g = chain.graph;
    let root = g.root();
    let mut order = chain.nodes.clone();
    order.pop();
    assert!(g.reorder_block(root, order).is_err());
    let mut reversed = chain.nodes.clone();
    reversed.reverse();
    g.reorder_block(root, reversed)?;
    assert_eq!(g.position(chain.nodes[0])?, 4);
    Ok(())
}

#[test]
fn display_lists_nodes_and_blocks() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_param(root, f32_tensor(&[2, 3]))?;
    let add = g.append_node(
        root,
        NodeKind::op_with("aten::add", OpAttrs::none().with("alpha", AttrValue::Int(1))),
        vec![x, x],
        vec![f32_tensor(&[2, 3])],
    )?;
    let lp = g.append_node(root, NodeKind::Loop, vec![], vec![])?;
    g.add_block(lp)?;
    g.set_returns(root, vec![out(&g, add)?])?;

    let text = g.to_string();
    assert!(text.starts_with("graph(%0 : f32[2,3]@cpu):"));
    assert!(text.contains("%1 = aten::add[alpha=1](%0, %0)"));
    assert!(text.contains("block1():"));
    assert!(text.contains("-> (%1)"));
    Ok(())
}
