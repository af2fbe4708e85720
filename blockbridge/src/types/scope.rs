use std::collections::HashMap;

use crate::utils::InternalError;

use super::TypeId;

/// Lexical variable scopes used while walking function bodies.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<HashMap<String, TypeId>>,
    this_class: Option<TypeId>,
    returns: Vec<TypeId>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
            this_class: None,
            returns: vec![],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Leaves the innermost frame. The global frame can't be left.
    pub fn pop(&mut self) -> Result<(), InternalError> {
        if self.frames.len() <= 1 {
            return Err(InternalError::ScopeUnderflow);
        }
        self.frames.pop();
        Ok(())
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: TypeId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), ty);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }

    pub fn this_class(&self) -> Option<TypeId> {
        self.this_class
    }

    /// Sets the class `this` refers to and hands back the previous one.
    pub fn set_this_class(&mut self, class: Option<TypeId>) -> Option<TypeId> {
        std::mem::replace(&mut self.this_class, class)
    }

    pub fn enter_function(&mut self, ret: TypeId) {
        self.push();
        self.returns.push(ret);
    }

    pub fn leave_function(&mut self) -> Result<(), InternalError> {
        self.returns.pop().ok_or(InternalError::ScopeUnderflow)?;
        self.pop()
    }

    pub fn return_type(&self) -> Option<TypeId> {
        self.returns.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn shadowing_and_underflow() {
        let table = TypeTable::new();
        let mut scope = Scope::new();
        scope.declare("x", table.number());
        scope.push();
        scope.declare("x", table.string());
        assert_eq!(scope.lookup("x"), Some(table.string()));
        scope.pop().unwrap();
        assert_eq!(scope.lookup("x"), Some(table.number()));
        assert_eq!(scope.pop(), Err(InternalError::ScopeUnderflow));
    }

    #[test]
    fn function_frames() {
        let table = TypeTable::new();
        let mut scope = Scope::new();
        scope.enter_function(table.boolean());
        assert_eq!(scope.return_type(), Some(table.boolean()));
        scope.leave_function().unwrap();
        assert_eq!(scope.return_type(), None);
        assert_eq!(scope.leave_function(), Err(InternalError::ScopeUnderflow));
    }
}
