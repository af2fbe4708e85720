mod display;
mod emit;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

#[derive(
    EnumString, Display, IntoStaticStr, EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[strum(serialize_all = "snake_case")]
pub enum BlockKind {
    Program,
    Namespace,
    SourceDeclaration,
    FunctionDefinition,
    FunctionReturn,
    VariablesSet,
    VariablesChange,
    PropertySet,
    ListsSetIndex,
    CallStatement,
    ControlsIf,
    ControlsIfBranch,
    ControlsElse,
    ControlsWhile,
    ControlsFor,
    ControlsRepeat,
    ControlsForOf,
    BreakKeyword,
    ContinueKeyword,
    Unrepresentable,

    MathNumber,
    Text,
    LogicBoolean,
    LogicNull,
    VariablesGet,
    MathArithmetic,
    TextJoin,
    LogicCompare,
    LogicOperation,
    LogicNegate,
    MathNeg,
    ListsCreateWith,
    ListsIndexGet,
    PropertyGet,
    EnumMember,
    CallExpression,
    ObjectCreate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Literal(String),
    Child(BlockNode),
}

/// One block of the editor tree. Field order is significant and part of equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    pub kind: BlockKind,
    pub fields: Vec<(String, Field)>,
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            fields: vec![],
            children: vec![],
        }
    }

    pub fn literal(mut self, slot: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((slot.into(), Field::Literal(value.into())));
        self
    }

    pub fn child(mut self, slot: impl Into<String>, node: BlockNode) -> Self {
        self.fields.push((slot.into(), Field::Child(node)));
        self
    }

    pub fn with_children(mut self, children: Vec<BlockNode>) -> Self {
        self.children = children;
        self
    }

    pub fn field(&self, slot: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find_map(|(name, field)| (name == slot).then_some(field))
    }

    pub fn literal_of(&self, slot: &str) -> Option<&str> {
        match self.field(slot) {
            Some(Field::Literal(value)) => Some(value),
            _ => None,
        }
    }

    pub fn child_of(&self, slot: &str) -> Option<&BlockNode> {
        match self.field(slot) {
            Some(Field::Child(node)) => Some(node),
            _ => None,
        }
    }

    /// Fields named `PREFIX0`, `PREFIX1`, ... up to the first gap.
    pub fn indexed(&self, prefix: &str) -> Vec<&Field> {
        (0..)
            .map_while(|i| self.field(&format!("{}{}", prefix, i)))
            .collect()
    }

    /// Every block below this one (value slots and statement children), preorder.
    pub fn descendants(&self) -> Vec<&BlockNode> {
        let mut out = vec![];
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'b>(&'b self, out: &mut Vec<&'b BlockNode>) {
        for (_, field) in &self.fields {
            if let Field::Child(node) = field {
                out.push(node);
                node.collect_descendants(out);
            }
        }
        for child in &self.children {
            out.push(child);
            child.collect_descendants(out);
        }
    }

    pub fn count(&self, kind: BlockKind) -> usize {
        self.descendants().iter().filter(|b| b.kind == kind).count()
    }
}
