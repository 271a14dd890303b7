use std::fmt;

use super::{BlockId, Graph, Node, NodeKind, ValueId};

/// One-line rendering of a node: `%4, %5 = aten::add[alpha=1](%1, %2)`.
pub fn describe_node(node: &Node) -> String {
    let outputs = join_values(&node.outputs);
    let inputs = join_values(&node.inputs);
    let head = match &node.kind {
        NodeKind::Op { op, attrs } if !attrs.items.is_empty() => {
            let attrs = attrs
                .items
                .iter()
                .map(|attr| format!("{}={}", attr.name, attr.value))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}[{}]", op, attrs)
        }
        NodeKind::Constant { value } => format!("prim::Constant[value={}]", value),
        NodeKind::EngineCall { engine } => format!("engine::call[{}]", engine),
        kind => kind.name().to_string(),
    };
    if outputs.is_empty() {
        format!("{}({})", head, inputs)
    } else {
        format!("{} = {}({})", outputs, head, inputs)
    }
}

fn join_values(values: &[ValueId]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Graph {
    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, root: BlockId, depth: usize) -> fmt::Result {
        // (block, depth, next node, header written)
        let mut stack = vec![(root, depth, 0, true)];
        while let Some(frame) = stack.last_mut() {
            let (block, depth) = (frame.0, frame.1);
            if !frame.3 {
                frame.3 = true;
                let params = self
                    .block(block)
                    .map(|b| self.typed_values(&b.params))
                    .unwrap_or_default();
                writeln!(f, "{:indent$}{}({}):", "", block, params, indent = (depth - 1) * 2)?;
            }
            let Ok(data) = self.block(block) else {
                writeln!(f, "{:indent$}<missing {}>", "", block, indent = depth * 2)?;
                stack.pop();
                continue;
            };
            let Some(id) = data.nodes.get(frame.2).copied() else {
                writeln!(
                    f,
                    "{:indent$}-> ({})",
                    "",
                    join_values(&data.returns),
                    indent = depth * 2
                )?;
                stack.pop();
                continue;
            };
            frame.2 += 1;
            let Ok(node) = self.node(id) else {
                writeln!(f, "{:indent$}<missing {}>", "", id, indent = depth * 2)?;
                continue;
            };
            writeln!(f, "{:indent$}{}", "", describe_node(node), indent = depth * 2)?;
            for nested in node.blocks.iter().rev() {
                stack.push((*nested, depth + 2, 0, false));
            }
        }
        Ok(())
    }

    fn typed_values(&self, values: &[ValueId]) -> String {
        values
            .iter()
            .map(|v| match self.value(*v) {
                Ok(value) => format!("{} : {}", v, value.ty),
                Err(_) => v.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .block(self.root())
            .map(|b| b.params.clone())
            .unwrap_or_default();
        writeln!(f, "graph({}):", self.typed_values(&params))?;
        self.fmt_block(f, self.root(), 1)
    }
}
