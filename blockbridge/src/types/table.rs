use std::collections::HashMap;

use crate::utils::InternalError;

use super::{Primitive, Supertype, TypeDescriptor, TypeId};

/// Interner for type descriptors. Built once per program, read-only afterwards.
#[derive(Debug, Clone)]
pub struct TypeTable {
    descriptors: Vec<TypeDescriptor>,
    index: HashMap<TypeDescriptor, TypeId>,
    classes: HashMap<String, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            descriptors: vec![],
            index: HashMap::new(),
            classes: HashMap::new(),
        };
        // Fixed slots, see the accessors below.
        for prim in [
            Primitive::Number,
            Primitive::String,
            Primitive::Boolean,
            Primitive::Void,
            Primitive::Any,
        ] {
            table.intern(TypeDescriptor::Primitive(prim));
        }
        table
    }

    pub fn number(&self) -> TypeId {
        TypeId(0)
    }

    pub fn string(&self) -> TypeId {
        TypeId(1)
    }

    pub fn boolean(&self) -> TypeId {
        TypeId(2)
    }

    pub fn void(&self) -> TypeId {
        TypeId(3)
    }

    pub fn any(&self) -> TypeId {
        TypeId(4)
    }

    pub fn primitive(&self, prim: Primitive) -> TypeId {
        match prim {
            Primitive::Number => self.number(),
            Primitive::String => self.string(),
            Primitive::Boolean => self.boolean(),
            Primitive::Void => self.void(),
            Primitive::Any => self.any(),
        }
    }

    pub fn intern(&mut self, desc: TypeDescriptor) -> TypeId {
        if let Some(id) = self.index.get(&desc) {
            return *id;
        }
        let id = TypeId(self.descriptors.len());
        if let TypeDescriptor::Class { name, .. } = &desc {
            self.classes.insert(name.clone(), id);
        }
        self.descriptors.push(desc.clone());
        self.index.insert(desc, id);
        id
    }

    pub fn array(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeDescriptor::Array(elem))
    }

    pub fn function(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(TypeDescriptor::Function { params, ret })
    }

    /// Interns a class below `supertype`, computing its depth from the parent.
    pub fn class(&mut self, name: &str, supertype: Supertype) -> Result<TypeId, InternalError> {
        let depth = match supertype {
            Supertype::None => 0,
            Supertype::One(parent) => match self.get(parent)? {
                TypeDescriptor::Class { depth, .. } => depth + 1,
                _ => return Err(InternalError::CorruptedAncestorChain(name.to_owned())),
            },
        };
        Ok(self.intern(TypeDescriptor::Class {
            name: name.to_owned(),
            supertype,
            depth,
        }))
    }

    pub fn interface(&mut self, name: &str, supertypes: Vec<TypeId>) -> TypeId {
        self.intern(TypeDescriptor::Interface {
            name: name.to_owned(),
            supertypes,
        })
    }

    pub fn get(&self, id: TypeId) -> Result<&TypeDescriptor, InternalError> {
        self.descriptors
            .get(id.0)
            .ok_or(InternalError::UnknownTypeId(id.0))
    }

    pub fn class_named(&self, name: &str) -> Option<TypeId> {
        self.classes.get(name).copied()
    }

    pub fn is_any(&self, id: TypeId) -> bool {
        id == self.any()
    }

    /// The reflexive chain `[id, parent, grandparent, ...]` of a class.
    /// Depths must decrease by exactly one along the chain.
    pub fn ancestors(&self, id: TypeId) -> Result<Vec<TypeId>, InternalError> {
        let mut chain = vec![id];
        let mut current = id;
        loop {
            let (name, supertype, depth) = match self.get(current)? {
                TypeDescriptor::Class {
                    name,
                    supertype,
                    depth,
                } => (name, *supertype, *depth),
                TypeDescriptor::GenericInstance { base, .. } if current == id => {
                    current = *base;
                    chain.push(current);
                    continue;
                }
                _ => return Ok(chain),
            };
            match supertype {
                Supertype::None if depth == 0 => return Ok(chain),
                Supertype::One(parent) => {
                    let parent_depth = match self.get(parent)? {
                        TypeDescriptor::Class { depth, .. } => *depth,
                        _ => return Err(InternalError::CorruptedAncestorChain(name.clone())),
                    };
                    if parent_depth + 1 != depth || chain.len() > self.descriptors.len() {
                        return Err(InternalError::CorruptedAncestorChain(name.clone()));
                    }
                    chain.push(parent);
                    current = parent;
                }
                Supertype::None => {
                    return Err(InternalError::CorruptedAncestorChain(name.clone()))
                }
            }
        }
    }

    /// Reflexive-transitive subclass test.
    pub fn is_subclass(&self, sub: TypeId, sup: TypeId) -> Result<bool, InternalError> {
        Ok(self.ancestors(sub)?.contains(&sup))
    }

    /// Interface ids reachable through `extends`, including `id` itself.
    pub fn interface_ancestors(&self, id: TypeId) -> Result<Vec<TypeId>, InternalError> {
        let mut seen = vec![];
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            if let TypeDescriptor::Interface { supertypes, .. } = self.get(next)? {
                stack.extend(supertypes.iter().copied());
            }
        }
        Ok(seen)
    }

    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Ok(TypeDescriptor::Primitive(prim)) => prim.to_string(),
            Ok(TypeDescriptor::Class { name, .. } | TypeDescriptor::Interface { name, .. }) => {
                name.clone()
            }
            Ok(TypeDescriptor::Array(elem)) => format!("{}[]", self.display(*elem)),
            Ok(TypeDescriptor::Function { params, ret }) => format!(
                "({}) => {}",
                params
                    .iter()
                    .map(|p| self.display(*p))
                    .collect::<Vec<_>>()
                    .join(", "),
                self.display(*ret)
            ),
            Ok(TypeDescriptor::GenericInstance { base, args }) => format!(
                "{}<{}>",
                self.display(*base),
                args.iter()
                    .map(|a| self.display(*a))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Err(_) => format!("<unknown {}>", id),
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt(&mut self, id: TypeId, desc: TypeDescriptor) {
        self.descriptors[id.0] = desc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_identity() {
        let mut table = TypeTable::new();
        let a = table.array(table.number());
        let b = table.array(table.number());
        assert_eq!(a, b);
        let f = table.function(vec![a], table.void());
        let g = table.function(vec![b], table.void());
        assert_eq!(f, g);
        assert_ne!(a, table.array(table.string()));
    }

    #[test]
    fn chain_depths() {
        let mut table = TypeTable::new();
        let a = table.class("A", Supertype::None).unwrap();
        let b = table.class("B", Supertype::One(a)).unwrap();
        let c = table.class("C", Supertype::One(b)).unwrap();
        assert_eq!(table.ancestors(c).unwrap(), vec![c, b, a]);
        assert!(table.is_subclass(c, a).unwrap());
        assert!(!table.is_subclass(a, c).unwrap());
        assert_eq!(table.class_named("B"), Some(b));
    }

    #[test]
    fn unknown_id_is_internal() {
        let table = TypeTable::new();
        assert_eq!(
            table.get(TypeId(999)),
            Err(InternalError::UnknownTypeId(999))
        );
    }

    #[test]
    fn corrupted_chain_is_detected() {
        let mut table = TypeTable::new();
        let a = table.class("A", Supertype::None).unwrap();
        let b = table.class("B", Supertype::One(a)).unwrap();
        table.corrupt(
            b,
            TypeDescriptor::Class {
                name: "B".into(),
                supertype: Supertype::One(a),
                depth: 5,
            },
        );
        assert_eq!(
            table.ancestors(b),
            Err(InternalError::CorruptedAncestorChain("B".into()))
        );
    }
}
