use std::fmt::{Display, Formatter, Result};

use super::{BlockNode, Field};

const INDENT: &str = "  ";

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Literal(value) => write!(f, "{:?}", value),
            Self::Child(node) => write_inline(f, node),
        }
    }
}

fn write_inline(f: &mut Formatter<'_>, node: &BlockNode) -> Result {
    write!(f, "{}", node.kind)?;
    if node.fields.is_empty() {
        return Ok(());
    }
    write!(f, "(")?;
    for (i, (slot, field)) in node.fields.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", slot, field)?;
    }
    write!(f, ")")
}

fn write_tree(f: &mut Formatter<'_>, node: &BlockNode, depth: usize) -> Result {
    write!(f, "{}", INDENT.repeat(depth))?;
    write_inline(f, node)?;
    writeln!(f)?;
    for child in &node.children {
        write_tree(f, child, depth + 1)?;
    }
    Ok(())
}

/// Statement blocks on their own lines, value blocks inline.
impl Display for BlockNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write_tree(f, self, 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::blocks::{BlockKind, BlockNode};

    #[test]
    fn tree_layout() {
        let tree = BlockNode::new(BlockKind::Program).with_children(vec![BlockNode::new(
            BlockKind::ControlsWhile,
        )
        .child(
            "COND",
            BlockNode::new(BlockKind::LogicBoolean).literal("BOOL", "true"),
        )
        .with_children(vec![BlockNode::new(BlockKind::BreakKeyword)])]);
        assert_eq!(
            tree.to_string(),
            "program\n  controls_while(COND: logic_boolean(BOOL: \"true\"))\n    break_keyword\n"
        );
    }
}
