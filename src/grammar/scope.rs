use super::{Rule, Signature};
use crate::tree::Node;
use std::ops::{Deref, DerefMut};

/// The bound-variable rules active at some point in a traversal, innermost last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    bound: Vec<Rule>,
}
impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }
    pub fn len(&self) -> usize {
        self.bound.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
    pub fn rules(&self) -> &[Rule] {
        &self.bound
    }
    /// The active rules expanding `nonterminal`.
    pub fn rules_for(&self, nonterminal: &str) -> Vec<&Rule> {
        self.bound
            .iter()
            .filter(|r| r.nonterminal == nonterminal)
            .collect()
    }
    /// `true` if a variable named `name` is active.
    pub fn contains(&self, name: &str) -> bool {
        self.bound.iter().any(|r| r.name == name)
    }
    pub(crate) fn matching(&self, signature: &Signature) -> Vec<&Rule> {
        self.bound
            .iter()
            .filter(|r| {
                r.nonterminal == signature.nonterminal
                    && r.name == signature.name
                    && r.to == signature.expansion
            })
            .collect()
    }
    pub(crate) fn push(&mut self, rule: Rule) {
        self.bound.push(rule)
    }
}

/// Extends a [`Scope`] with the variables of one or more binders and restores
/// it when dropped.
///
/// The guard borrows the scope mutably, so nested guards are necessarily
/// released innermost first, and early returns through `?` restore the scope
/// like any other exit. The guard dereferences to the extended scope.
///
/// ```
/// # use lotinduction::grammar::{BinderSpec, Grammar, Scope, ScopeGuard};
/// # use rand::{rngs::StdRng, SeedableRng};
/// let mut g = Grammar::new("EXPR");
/// g.add_binder("EXPR", "lambda", Some(vec!["EXPR"]), 10.0, BinderSpec::new("EXPR")).unwrap();
/// g.add_rule("EXPR", "x", None, 1.0).unwrap();
/// let mut rng = StdRng::seed_from_u64(0);
/// let tree = loop {
///     let t = g.generate("EXPR", &mut rng).unwrap();
///     if t.is_binder() { break t; }
/// };
///
/// let mut scope = Scope::new();
/// {
///     let inner = ScopeGuard::enter(&mut scope, &tree);
///     assert_eq!(inner.len(), 1);
///     assert_eq!(g.visible_rules("EXPR", &inner).len(), 3);
/// }
/// assert!(scope.is_empty());
/// ```
///
/// [`Scope`]: struct.Scope.html
pub struct ScopeGuard<'s> {
    scope: &'s mut Scope,
    restore: usize,
}
impl<'s> ScopeGuard<'s> {
    /// Activate the variable introduced by `node`, if it is a binder.
    pub fn enter(scope: &'s mut Scope, node: &Node) -> Self {
        let restore = scope.len();
        if let Some(rule) = node.bound_rule() {
            scope.push(rule.clone());
        }
        ScopeGuard { scope, restore }
    }
    /// Activate the variables of every binder from `root` down to and
    /// including the node at `place`.
    pub fn recurse_up(scope: &'s mut Scope, root: &Node, place: &[usize]) -> Self {
        let mut guard = ScopeGuard::above(scope, root, place);
        if let Some(rule) = root.get(place).and_then(Node::bound_rule) {
            guard.push(rule.clone());
        }
        guard
    }
    /// Activate the variables of every binder strictly above the node at
    /// `place`: the scope in which that node was generated.
    pub fn above(scope: &'s mut Scope, root: &Node, place: &[usize]) -> Self {
        let restore = scope.len();
        for rule in root.binders_above(place) {
            scope.push(rule.clone());
        }
        ScopeGuard { scope, restore }
    }
}
impl<'s> Deref for ScopeGuard<'s> {
    type Target = Scope;
    fn deref(&self) -> &Scope {
        &*self.scope
    }
}
impl<'s> DerefMut for ScopeGuard<'s> {
    fn deref_mut(&mut self) -> &mut Scope {
        &mut *self.scope
    }
}
impl<'s> Drop for ScopeGuard<'s> {
    fn drop(&mut self) {
        self.scope.bound.truncate(self.restore);
    }
}
