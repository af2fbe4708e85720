use std::fmt::{Display, Formatter};

use strum::{Display as StrumDisplay, EnumString};

/// Handle into a [`super::TypeTable`]. Equal ids mean structurally equal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(super) usize);

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(EnumString, StrumDisplay, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Primitive {
    Number,
    String,
    Boolean,
    Void,
    /// Unresolved or external type, compatible with everything.
    Any,
}

impl Primitive {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number)
    }
}

/// Single inheritance: a class has at most one direct supertype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Supertype {
    None,
    One(TypeId),
}

impl Supertype {
    pub fn id(self) -> Option<TypeId> {
        match self {
            Self::None => None,
            Self::One(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Class {
        name: String,
        supertype: Supertype,
        /// Length of the ancestor chain above this class.
        depth: usize,
    },
    Interface {
        name: String,
        supertypes: Vec<TypeId>,
    },
    Array(TypeId),
    Function {
        params: Vec<TypeId>,
        ret: TypeId,
    },
    GenericInstance {
        base: TypeId,
        args: Vec<TypeId>,
    },
}

impl TypeDescriptor {
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Class { name, .. } | Self::Interface { name, .. } => Some(name),
            _ => None,
        }
    }
}
