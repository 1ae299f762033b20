//! Local variable scope for one function body.
//!
//! Locals live in a flat slot list. Entering a block records the current
//! slot count as a checkpoint; leaving it truncates back to that count.
//! Lookups search from the newest slot backward, so a later definition
//! shadows an earlier one with the same name.
//!
//! `num_variables` tracks the high-water mark of simultaneously live
//! slots. The backend sizes the call frame from it.

use crate::decl::BoundDecl;

/// One live local variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Local {
    pub name: String,
    pub ty: BoundDecl,
    pub mutable: bool,
    pub slot: usize,
}

/// A lexical scope stack for one function being bound.
#[derive(Debug, Default)]
pub struct Scope {
    slots: Vec<Local>,
    checkpoints: Vec<usize>,
    num_variables: usize,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of slots the function's frame needs.
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// Start a nested block.
    pub fn push(&mut self) {
        self.checkpoints.push(self.slots.len());
    }

    /// Close the innermost block and forget every local defined in it.
    ///
    /// # Panics
    ///
    /// Panics if there is no matching [`Scope::push`].
    pub fn pop(&mut self) {
        let start = self
            .checkpoints
            .pop()
            .expect("scope pop without matching push");
        self.slots.truncate(start);
    }

    /// Number of open blocks.
    pub fn depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// Define a local in the next free slot and return that slot.
    pub fn define(&mut self, name: impl Into<String>, ty: BoundDecl, mutable: bool) -> usize {
        let slot = self.slots.len();
        self.slots.push(Local {
            name: name.into(),
            ty,
            mutable,
            slot,
        });
        self.num_variables = self.num_variables.max(self.slots.len());
        slot
    }

    /// The most recent live local named `name`.
    pub fn lookup(&self, name: &str) -> Option<&Local> {
        self.slots.iter().rev().find(|local| local.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn is_mutable(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|local| local.mutable)
    }

    /// Every live local, oldest first.
    pub fn live(&self) -> &[Local] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_names(scope: &Scope) -> Vec<&str> {
        scope.live().iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn nested_blocks_track_high_water() {
        let mut scope = Scope::new();
        scope.push();
        scope.define("a", BoundDecl::int(), false);
        scope.push();
        scope.define("b", BoundDecl::int(), false);
        scope.pop();
        scope.define("c", BoundDecl::int(), false);

        assert_eq!(live_names(&scope), vec!["a", "c"]);
        assert_eq!(scope.lookup("c").unwrap().slot, 1);

        scope.pop();
        assert!(scope.live().is_empty());
        assert_eq!(scope.num_variables(), 2);
    }

    #[test]
    fn high_water_never_decreases() {
        let mut scope = Scope::new();
        scope.push();
        for name in ["a", "b", "c"] {
            scope.define(name, BoundDecl::bool(), true);
        }
        scope.pop();
        scope.push();
        scope.define("d", BoundDecl::bool(), true);
        scope.pop();
        assert_eq!(scope.num_variables(), 3);
    }

    #[test]
    fn redefinition_shadows() {
        let mut scope = Scope::new();
        scope.define("x", BoundDecl::int(), false);
        scope.push();
        scope.define("x", BoundDecl::string(), true);

        let x = scope.lookup("x").unwrap();
        assert_eq!(x.ty, BoundDecl::string());
        assert!(scope.is_mutable("x"));

        scope.pop();
        assert_eq!(scope.lookup("x").unwrap().ty, BoundDecl::int());
        assert!(!scope.is_mutable("x"));
    }

    #[test]
    fn unknown_names() {
        let scope = Scope::new();
        assert!(!scope.contains("nope"));
        assert!(!scope.is_mutable("nope"));
    }

    #[test]
    #[should_panic(expected = "scope pop without matching push")]
    fn pop_without_push_panics() {
        let mut scope = Scope::new();
        scope.pop();
    }
}
