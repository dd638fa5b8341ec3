use super::{Grammar, Rule, Scope};
use crate::tree::{Arg, Node};
use itertools::Itertools;
use std::iter;

type Trees<'a> = Box<dyn Iterator<Item = Node> + 'a>;

impl Grammar {
    /// Lazily enumerate every tree rooted at `nonterminal` whose depth is
    /// exactly `depth`, where a lone leaf has depth 0.
    ///
    /// Only the fixed rules are visible at the root; bound variables appear
    /// beneath the binders that introduce them. Each call restarts the
    /// enumeration.
    ///
    /// ```
    /// # use lotinduction::grammar::Grammar;
    /// let mut g = Grammar::new("BOOL");
    /// g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0).unwrap();
    /// g.add_rule("BOOL", "True", None, 1.0).unwrap();
    /// g.add_rule("BOOL", "False", None, 1.0).unwrap();
    ///
    /// assert_eq!(g.enumerate_at_depth(0, "BOOL").count(), 2);
    /// // and_ over two leaves.
    /// assert_eq!(g.enumerate_at_depth(1, "BOOL").count(), 4);
    /// // 6 trees of depth <= 1 on each side, minus the 2 * 2 with both sides leaves.
    /// assert_eq!(g.enumerate_at_depth(2, "BOOL").count(), 6 * 6 - 2 * 2);
    /// ```
    pub fn enumerate_at_depth<'a>(&'a self, depth: usize, nonterminal: &str) -> Trees<'a> {
        self.enumerate_in(depth, nonterminal.to_string(), Scope::new())
    }
    /// Lazily enumerate every tree rooted at `nonterminal` with depth at most
    /// `max_depth`, in order of increasing depth.
    pub fn enumerate<'a>(&'a self, max_depth: usize, nonterminal: &str) -> Trees<'a> {
        let nonterminal = nonterminal.to_string();
        Box::new((0..=max_depth).flat_map(move |d| self.enumerate_at_depth(d, &nonterminal)))
    }
    fn enumerate_in<'a>(&'a self, depth: usize, nonterminal: String, scope: Scope) -> Trees<'a> {
        let rules = self
            .visible_rules(&nonterminal, &scope)
            .into_iter()
            .cloned()
            .collect_vec();
        Box::new(
            rules
                .into_iter()
                .flat_map(move |rule| self.enumerate_rule(depth, rule, scope.clone())),
        )
    }
    fn enumerate_rule<'a>(&'a self, depth: usize, rule: Rule, mut scope: Scope) -> Trees<'a> {
        let stub = self.instantiate(&rule);
        let to = match rule.to {
            None if depth == 0 => return Box::new(iter::once(stub)),
            None => return Box::new(iter::empty()),
            Some(to) => to,
        };
        let slots = to
            .into_iter()
            .map(|symbol| {
                let is_nt = self.is_nonterminal(&symbol);
                (symbol, is_nt)
            })
            .collect_vec();
        if !slots.iter().any(|&(_, is_nt)| is_nt) {
            if depth > 0 {
                return Box::new(iter::empty());
            }
            let mut node = stub;
            node.args = Some(
                slots
                    .into_iter()
                    .map(|(symbol, _)| Arg::Terminal(symbol))
                    .collect(),
            );
            return Box::new(iter::once(node));
        }
        if depth == 0 {
            return Box::new(iter::empty());
        }
        if let Some(bound) = stub.bound_rule() {
            scope.push(bound.clone());
        }
        // children have depth < `depth`, and at least one has depth `depth - 1`.
        let assignments = slots
            .iter()
            .map(|&(_, is_nt)| if is_nt { (0..depth).collect_vec() } else { vec![0] })
            .multi_cartesian_product()
            .filter(|ds| {
                ds.iter()
                    .zip(&slots)
                    .filter(|(_, (_, is_nt))| *is_nt)
                    .map(|(d, _)| *d)
                    .max()
                    == Some(depth - 1)
            })
            .collect_vec();
        Box::new(assignments.into_iter().flat_map(move |ds| {
            let slots = slots
                .iter()
                .zip(ds)
                .map(|((symbol, is_nt), d)| (symbol.clone(), *is_nt, d))
                .collect_vec();
            let stub = stub.clone();
            self.enumerate_args(vec![], slots, scope.clone())
                .map(move |args| {
                    let mut node = stub.clone();
                    node.args = Some(args);
                    node
                })
        }))
    }
    fn enumerate_args<'a>(
        &'a self,
        mut prefix: Vec<Arg>,
        slots: Vec<(String, bool, usize)>,
        scope: Scope,
    ) -> Box<dyn Iterator<Item = Vec<Arg>> + 'a> {
        let i = prefix.len();
        if i == slots.len() {
            return Box::new(iter::once(prefix));
        }
        let (symbol, is_nt, d) = slots[i].clone();
        if !is_nt {
            prefix.push(Arg::Terminal(symbol));
            return self.enumerate_args(prefix, slots, scope);
        }
        Box::new(
            self.enumerate_in(d, symbol, scope.clone())
                .flat_map(move |child| {
                    let mut prefix = prefix.clone();
                    prefix.push(Arg::Node(child));
                    self.enumerate_args(prefix, slots.clone(), scope.clone())
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::{BinderSpec, Grammar};
    use std::collections::HashSet;

    #[test]
    fn enumerated_trees_are_unique_and_have_exact_depth() {
        let mut g = Grammar::new("BOOL");
        g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0)
            .unwrap();
        g.add_rule("BOOL", "not_", Some(vec!["BOOL"]), 1.0).unwrap();
        g.add_rule("BOOL", "True", None, 1.0).unwrap();
        for d in 0..3 {
            let trees = g.enumerate_at_depth(d, "BOOL").collect::<Vec<_>>();
            assert!(trees.iter().all(|t| t.depth() == d));
            let unique = trees.iter().collect::<HashSet<_>>();
            assert_eq!(unique.len(), trees.len());
        }
        // depth 1: and_(T, T), not_(T)
        assert_eq!(g.enumerate_at_depth(1, "BOOL").count(), 2);
        assert_eq!(
            g.enumerate(2, "BOOL").count(),
            1 + 2 + g.enumerate_at_depth(2, "BOOL").count()
        );
    }

    #[test]
    fn bound_variables_are_enumerated_inside_binders() {
        let mut g = Grammar::new("EXPR");
        g.add_binder(
            "EXPR",
            "lambda",
            Some(vec!["EXPR"]),
            1.0,
            BinderSpec::new("EXPR"),
        )
        .unwrap();
        g.add_rule("EXPR", "x", None, 1.0).unwrap();
        // lambda y0: x, lambda y0: y0
        let trees = g.enumerate_at_depth(1, "EXPR").collect::<Vec<_>>();
        assert_eq!(trees.len(), 2);
        for t in &trees {
            assert!(g.log_probability(t).unwrap().is_finite());
        }
        assert_eq!(g.enumerate_at_depth(0, "EXPR").count(), 1);
    }
}
