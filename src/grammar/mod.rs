//! (representation) Probabilistic context-free grammars with scoped bound
//! variables.
//!
//! A [`Grammar`] owns a fixed table of weighted [`Rule`]s. Binder rules
//! additionally describe a variable: every time a binder is used, a fresh
//! variable-use rule is activated, and that rule is visible only beneath the
//! binder. The fixed table never changes during a traversal; the active
//! variable rules live in a [`Scope`] that traversals carry with them, and
//! [`ScopeGuard`] brackets each descent so the scope always mirrors the
//! binders above the current node.
//!
//! # Example
//!
//! ```
//! # use lotinduction::grammar::{BinderSpec, Grammar};
//! # use rand::{rngs::StdRng, SeedableRng};
//! let mut g = Grammar::new("START");
//! g.add_rule("START", "", Some(vec!["EXPR"]), 1.0).unwrap();
//! g.add_binder("EXPR", "lambda", Some(vec!["EXPR"]), 1.0, BinderSpec::new("EXPR")).unwrap();
//! g.add_rule("EXPR", "x", None, 1.0).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! for _ in 0..20 {
//!     let tree = g.generate("START", &mut rng).unwrap();
//!     assert!(g.log_probability(&tree).unwrap().is_finite());
//! }
//! ```
//!
//! [`Grammar`]: struct.Grammar.html
//! [`Rule`]: struct.Rule.html
//! [`Scope`]: struct.Scope.html
//! [`ScopeGuard`]: struct.ScopeGuard.html

mod enumerate;
mod pack;
mod scope;

pub use self::scope::{Scope, ScopeGuard};
use crate::tree::{Arg, Node, NodeKind};
use crate::utilities::weighted_choice;
use crate::{GrammarError, SampleError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_BOUND_VARIABLE: AtomicUsize = AtomicUsize::new(0);

/// A process-wide unique name for a bound variable.
pub(crate) fn fresh_bound_name() -> String {
    format!(
        "bv__{}",
        NEXT_BOUND_VARIABLE.fetch_add(1, Ordering::Relaxed)
    )
}

/// The identity of a rule: two rules with the same signature are
/// interchangeable, whatever their weights.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub nonterminal: String,
    pub name: String,
    pub expansion: Option<Vec<String>>,
}
impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.nonterminal, self.name)?;
        if let Some(ref expansion) = self.expansion {
            write!(f, "[{}]", expansion.join(", "))?;
        }
        Ok(())
    }
}

/// How to build the variable introduced by a binder rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinderSpec {
    /// The nonterminal the variable can replace.
    pub bound_type: String,
    /// The variable's own argument types, when it is used as a function.
    pub bound_args: Option<Vec<String>>,
    /// The display prefix of the variable, e.g. `y` in `lambda y0: y0`.
    pub prefix: String,
    /// The weight of the variable-use rule. Defaults to [`Grammar::bv_weight`].
    ///
    /// [`Grammar::bv_weight`]: struct.Grammar.html#structfield.bv_weight
    pub use_weight: Option<f64>,
}
impl BinderSpec {
    pub fn new(bound_type: &str) -> Self {
        BinderSpec {
            bound_type: bound_type.to_string(),
            bound_args: None,
            prefix: "y".to_string(),
            use_weight: None,
        }
    }
    pub fn with_args(mut self, args: Vec<&str>) -> Self {
        self.bound_args = Some(args.into_iter().map(String::from).collect());
        self
    }
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.use_weight = Some(weight);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Plain,
    Binder(BinderSpec),
    /// A bound-variable rule activated by a binder.
    Use { prefix: String },
}

/// One weighted expansion of a nonterminal.
///
/// `to == None` marks a terminal; `to == Some(vec![])` marks a zero-arity call.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub nonterminal: String,
    pub name: String,
    pub to: Option<Vec<String>>,
    pub weight: f64,
    pub kind: RuleKind,
}
impl Rule {
    pub fn signature(&self) -> Signature {
        Signature {
            nonterminal: self.nonterminal.clone(),
            name: self.name.clone(),
            expansion: self.to.clone(),
        }
    }
    pub fn is_binder(&self) -> bool {
        matches!(self.kind, RuleKind::Binder(_))
    }
    pub fn is_use(&self) -> bool {
        matches!(self.kind, RuleKind::Use { .. })
    }
    /// The display prefix for variables this rule introduces or represents.
    pub fn prefix(&self) -> &str {
        match self.kind {
            RuleKind::Binder(ref spec) => &spec.prefix,
            RuleKind::Use { ref prefix } => prefix,
            RuleKind::Plain => "y",
        }
    }
    /// The argument slots that expand back into this rule's own nonterminal.
    pub fn replicating_slots(&self) -> Vec<usize> {
        self.to
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, s)| **s == self.nonterminal)
            .map(|(i, _)| i)
            .collect()
    }
}

/// A ceiling on the size of generated trees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenerationLimit {
    /// Limit the number of nodes.
    #[serde(alias = "totalsize")]
    TotalSize(usize),
    /// Limit the depth, where a lone leaf has depth 0.
    #[serde(alias = "depth")]
    Depth(usize),
}

struct Budget {
    max_depth: usize,
    max_nodes: Option<usize>,
    nodes: usize,
}
impl Budget {
    fn visit(&mut self, depth: usize) -> Result<(), SampleError> {
        self.nodes += 1;
        if depth > self.max_depth || self.max_nodes.map_or(false, |n| self.nodes > n) {
            Err(SampleError::SizeExceeded)
        } else {
            Ok(())
        }
    }
}

/// A probabilistic context-free grammar whose binder rules introduce scoped
/// bound-variable rules.
#[derive(Debug, Clone)]
pub struct Grammar {
    start: String,
    nonterminals: Vec<String>,
    rules: HashMap<String, Vec<Rule>>,
    index: HashMap<Signature, Vec<usize>>,
    /// The default weight of bound-variable rules.
    pub bv_weight: f64,
    /// Generation beyond this depth fails with `SampleError::SizeExceeded`.
    pub max_depth: usize,
}
impl Grammar {
    /// Create an empty grammar whose trees are rooted at `start`.
    pub fn new(start: &str) -> Self {
        Grammar {
            start: start.to_string(),
            nonterminals: vec![],
            rules: HashMap::new(),
            index: HashMap::new(),
            bv_weight: 10.0,
            max_depth: 512,
        }
    }
    pub fn start(&self) -> &str {
        &self.start
    }
    /// Add a rule expanding `nonterminal`.
    pub fn add_rule(
        &mut self,
        nonterminal: &str,
        name: &str,
        to: Option<Vec<&str>>,
        weight: f64,
    ) -> Result<Rule, GrammarError> {
        self.push_rule(nonterminal, name, to, weight, RuleKind::Plain)
    }
    /// Add a rule whose nodes introduce a bound variable for their arguments.
    pub fn add_binder(
        &mut self,
        nonterminal: &str,
        name: &str,
        to: Option<Vec<&str>>,
        weight: f64,
        spec: BinderSpec,
    ) -> Result<Rule, GrammarError> {
        self.register(&spec.bound_type);
        self.push_rule(nonterminal, name, to, weight, RuleKind::Binder(spec))
    }
    fn register(&mut self, nonterminal: &str) {
        if !self.rules.contains_key(nonterminal) {
            self.nonterminals.push(nonterminal.to_string());
            self.rules.insert(nonterminal.to_string(), vec![]);
        }
    }
    fn push_rule(
        &mut self,
        nonterminal: &str,
        name: &str,
        to: Option<Vec<&str>>,
        weight: f64,
        kind: RuleKind,
    ) -> Result<Rule, GrammarError> {
        if !(weight > 0.0) || !weight.is_finite() {
            return Err(GrammarError::InvalidWeight {
                nonterminal: nonterminal.to_string(),
                name: name.to_string(),
                weight,
            });
        }
        let rule = Rule {
            nonterminal: nonterminal.to_string(),
            name: name.to_string(),
            to: to.map(|to| to.into_iter().map(String::from).collect()),
            weight,
            kind,
        };
        self.register(nonterminal);
        let rules = self
            .rules
            .get_mut(nonterminal)
            .ok_or_else(|| GrammarError::UnknownNonterminal(nonterminal.to_string()))?;
        self.index
            .entry(rule.signature())
            .or_insert_with(Vec::new)
            .push(rules.len());
        rules.push(rule.clone());
        Ok(rule)
    }
    /// The number of rules in the fixed table.
    pub fn nrules(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
    /// Nonterminals in the order they were first mentioned.
    pub fn nonterminals(&self) -> &[String] {
        &self.nonterminals
    }
    /// `true` if `symbol` has rules, or is the bound type of some binder.
    pub fn is_nonterminal(&self, symbol: &str) -> bool {
        self.rules.contains_key(symbol)
    }
    /// The fixed rules for `nonterminal`, in insertion order.
    pub fn rules_for(&self, nonterminal: &str) -> Result<&[Rule], GrammarError> {
        self.rules
            .get(nonterminal)
            .map(Vec::as_slice)
            .ok_or_else(|| GrammarError::UnknownNonterminal(nonterminal.to_string()))
    }
    /// The fixed rules for `nonterminal` followed by the bound-variable rules
    /// active in `scope`.
    pub fn visible_rules<'a>(&'a self, nonterminal: &str, scope: &'a Scope) -> Vec<&'a Rule> {
        self.rules
            .get(nonterminal)
            .into_iter()
            .flatten()
            .chain(scope.rules_for(nonterminal))
            .collect()
    }
    pub fn rule_by_name(&self, name: &str) -> Option<&Rule> {
        self.nonterminals
            .iter()
            .filter_map(|nt| self.rules.get(nt))
            .flatten()
            .find(|r| r.name == name)
    }
    /// `true` if `rule` has no nonterminal arguments.
    pub fn is_terminal_rule(&self, rule: &Rule) -> bool {
        rule.to
            .iter()
            .flatten()
            .all(|symbol| !self.is_nonterminal(symbol))
    }
    /// Rescale the weights of each nonterminal's fixed rules to sum to 1.
    pub fn renormalize(&mut self) {
        for rules in self.rules.values_mut() {
            let z = rules.iter().map(|r| r.weight).sum::<f64>();
            if z > 0.0 {
                for rule in rules.iter_mut() {
                    rule.weight /= z;
                }
            }
        }
    }
    /// The depth of the shallowest tree rooted at `symbol` using only fixed
    /// rules, or `None` if no such tree is finite. Terminal symbols have depth 0.
    pub fn depth_to_terminal(&self, symbol: &str) -> Option<usize> {
        if !self.is_nonterminal(symbol) {
            return Some(0);
        }
        let mut depths: HashMap<&str, usize> = HashMap::new();
        let mut changed = true;
        while changed {
            changed = false;
            for (nt, rules) in &self.rules {
                let best = rules
                    .iter()
                    .filter_map(|rule| {
                        rule.to
                            .iter()
                            .flatten()
                            .filter(|s| self.is_nonterminal(s))
                            .try_fold(0, |acc, s| depths.get(s.as_str()).map(|d| acc.max(d + 1)))
                    })
                    .min();
                if let Some(best) = best {
                    if depths.get(nt.as_str()).map_or(true, |&d| best < d) {
                        depths.insert(nt, best);
                        changed = true;
                    }
                }
            }
        }
        depths.get(symbol).cloned()
    }
    /// Activate the variable-use rule for a binder.
    fn activate(&self, spec: &BinderSpec) -> Rule {
        Rule {
            nonterminal: spec.bound_type.clone(),
            name: fresh_bound_name(),
            to: spec.bound_args.clone(),
            weight: spec.use_weight.unwrap_or(self.bv_weight),
            kind: RuleKind::Use {
                prefix: spec.prefix.clone(),
            },
        }
    }
    /// A node for `rule` with empty arguments, activating a variable for binders.
    pub(crate) fn instantiate(&self, rule: &Rule) -> Node {
        let kind = match rule.kind {
            RuleKind::Plain => NodeKind::Plain,
            RuleKind::Binder(ref spec) => NodeKind::Binder(Box::new(self.activate(spec))),
            RuleKind::Use { .. } => NodeKind::Use,
        };
        Node {
            returntype: rule.nonterminal.clone(),
            name: rule.name.clone(),
            args: rule.to.as_ref().map(|to| Vec::with_capacity(to.len())),
            kind,
        }
    }
    /// The unique visible rule that produced `node`.
    pub fn rule_for_node<'a>(&'a self, node: &Node, scope: &'a Scope) -> Result<&'a Rule, GrammarError> {
        if node.is_use() && !scope.contains(&node.name) {
            return Err(GrammarError::ScopeViolation(node.name.clone()));
        }
        let signature = node.signature();
        let fixed = self.rules.get(&signature.nonterminal);
        let mut matches = self
            .index
            .get(&signature)
            .into_iter()
            .flatten()
            .filter_map(|&i| fixed.and_then(|rules| rules.get(i)))
            .chain(scope.matching(&signature));
        match (matches.next(), matches.next()) {
            (Some(rule), None) => Ok(rule),
            (first, second) => {
                let count = first.iter().count() + second.iter().count() + matches.count();
                Err(GrammarError::Match { signature, count })
            }
        }
    }
    fn visible_weight(&self, nonterminal: &str, scope: &Scope) -> f64 {
        self.visible_rules(nonterminal, scope)
            .iter()
            .map(|r| r.weight)
            .sum()
    }
    fn sample_rule<R: Rng>(
        &self,
        nonterminal: &str,
        scope: &Scope,
        rng: &mut R,
    ) -> Result<Rule, SampleError> {
        let rules = self.visible_rules(nonterminal, scope);
        if rules.is_empty() {
            return Err(if self.is_nonterminal(nonterminal) {
                SampleError::SamplingExhausted
            } else {
                GrammarError::UnknownNonterminal(nonterminal.to_string()).into()
            });
        }
        let weights = rules.iter().map(|r| r.weight).collect::<Vec<_>>();
        let idx = weighted_choice(&weights, rng).ok_or(SampleError::SamplingExhausted)?;
        Ok(rules[idx].clone())
    }
    /// Sample a tree rooted at `nonterminal` with no variables in scope.
    ///
    /// Symbols without rules are reported as `UnknownNonterminal`; use
    /// `generate_symbol` when `nonterminal` may be a terminal.
    pub fn generate<R: Rng>(&self, nonterminal: &str, rng: &mut R) -> Result<Node, SampleError> {
        self.generate_in(nonterminal, &mut Scope::new(), rng)
    }
    /// Sample an argument for `symbol`: a fresh tree if it is a nonterminal,
    /// or `symbol` itself if it is a terminal.
    ///
    /// ```
    /// # use lotinduction::grammar::Grammar;
    /// # use lotinduction::tree::Arg;
    /// # use rand::{rngs::StdRng, SeedableRng};
    /// let mut g = Grammar::new("BOOL");
    /// g.add_rule("BOOL", "True", None, 1.0).unwrap();
    /// let mut rng = StdRng::seed_from_u64(0);
    /// assert_eq!(g.generate_symbol("x", &mut rng).unwrap(), Arg::Terminal("x".to_string()));
    /// assert_eq!(g.generate_symbol("BOOL", &mut rng).unwrap().symbol(), "BOOL");
    /// ```
    pub fn generate_symbol<R: Rng>(&self, symbol: &str, rng: &mut R) -> Result<Arg, SampleError> {
        if self.is_nonterminal(symbol) {
            Ok(Arg::Node(self.generate(symbol, rng)?))
        } else {
            Ok(Arg::Terminal(symbol.to_string()))
        }
    }
    /// Sample a tree rooted at `nonterminal` that may use the variables in `scope`.
    ///
    /// `scope` is returned unchanged.
    pub fn generate_in<R: Rng>(
        &self,
        nonterminal: &str,
        scope: &mut Scope,
        rng: &mut R,
    ) -> Result<Node, SampleError> {
        let mut budget = Budget {
            max_depth: self.max_depth,
            max_nodes: None,
            nodes: 0,
        };
        self.expand(nonterminal, scope, rng, 0, &mut budget)
    }
    /// Sample a tree rooted at `nonterminal` that respects `limit`.
    pub fn generate_limited<R: Rng>(
        &self,
        nonterminal: &str,
        limit: GenerationLimit,
        rng: &mut R,
    ) -> Result<Node, SampleError> {
        let mut budget = match limit {
            GenerationLimit::TotalSize(n) => Budget {
                max_depth: self.max_depth,
                max_nodes: Some(n),
                nodes: 0,
            },
            GenerationLimit::Depth(d) => Budget {
                max_depth: d.min(self.max_depth),
                max_nodes: None,
                nodes: 0,
            },
        };
        self.expand(nonterminal, &mut Scope::new(), rng, 0, &mut budget)
    }
    fn expand<R: Rng>(
        &self,
        nonterminal: &str,
        scope: &mut Scope,
        rng: &mut R,
        depth: usize,
        budget: &mut Budget,
    ) -> Result<Node, SampleError> {
        budget.visit(depth)?;
        let rule = self.sample_rule(nonterminal, scope, rng)?;
        let mut node = self.instantiate(&rule);
        if let Some(to) = rule.to.as_ref() {
            let mut scope = ScopeGuard::enter(scope, &node);
            let mut args = Vec::with_capacity(to.len());
            for symbol in to {
                if self.is_nonterminal(symbol) {
                    let child = self.expand(symbol, &mut scope, rng, depth + 1, budget)?;
                    args.push(Arg::Node(child));
                } else {
                    args.push(Arg::Terminal(symbol.clone()));
                }
            }
            drop(scope);
            node.args = Some(args);
        }
        Ok(node)
    }
    /// The log-probability of generating `node` with no variables in scope.
    pub fn log_probability(&self, node: &Node) -> Result<f64, GrammarError> {
        self.log_probability_in(node, &mut Scope::new())
    }
    /// The log-probability of generating `node` with the variables in `scope`
    /// visible. `scope` is returned unchanged.
    pub fn log_probability_in(&self, node: &Node, scope: &mut Scope) -> Result<f64, GrammarError> {
        let mut lp = {
            let rule = self.rule_for_node(node, scope)?;
            rule.weight.ln() - self.visible_weight(&node.returntype, scope).ln()
        };
        let mut scope = ScopeGuard::enter(scope, node);
        for child in node.children() {
            lp += self.log_probability_in(child, &mut scope)?;
        }
        Ok(lp)
    }
    /// The log-probability of regenerating the subtree at `place` of `root`
    /// in its lexical scope.
    pub fn log_probability_at(&self, root: &Node, place: &[usize]) -> Result<f64, GrammarError> {
        let node = root
            .get(place)
            .ok_or_else(|| GrammarError::InvalidPlace(place.to_vec()))?;
        let mut scope = Scope::new();
        let mut scope = ScopeGuard::above(&mut scope, root, place);
        self.log_probability_in(node, &mut scope)
    }
    /// The log-probability of the single expansion at `place` of `root`,
    /// ignoring its arguments.
    pub fn single_probability(&self, root: &Node, place: &[usize]) -> Result<f64, GrammarError> {
        let node = root
            .get(place)
            .ok_or_else(|| GrammarError::InvalidPlace(place.to_vec()))?;
        let mut scope = Scope::new();
        let scope = ScopeGuard::above(&mut scope, root, place);
        let rule = self.rule_for_node(node, &scope)?;
        Ok(rule.weight.ln() - self.visible_weight(&node.returntype, &scope).ln())
    }
    /// Visit every node of `root` in pre-order along with the scope that was
    /// active when it was generated.
    pub fn iterate_subnodes<F>(&self, root: &Node, mut f: F)
    where
        F: FnMut(&[usize], &Node, &Scope),
    {
        fn walk<F>(node: &Node, place: &mut Vec<usize>, scope: &mut Scope, f: &mut F)
        where
            F: FnMut(&[usize], &Node, &Scope),
        {
            f(place, node, scope);
            let mut scope = ScopeGuard::enter(scope, node);
            for (i, child) in node.children_with_index() {
                place.push(i);
                walk(child, place, &mut scope, f);
                place.pop();
            }
        }
        walk(root, &mut vec![], &mut Scope::new(), &mut f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn boolean() -> Grammar {
        let mut g = Grammar::new("START");
        g.add_rule("START", "", Some(vec!["BOOL"]), 1.0).unwrap();
        g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0)
            .unwrap();
        g.add_rule("BOOL", "True", None, 1.0).unwrap();
        g.add_rule("BOOL", "False", None, 1.0).unwrap();
        g
    }

    #[test]
    fn add_rule_rejects_bad_weights() {
        let mut g = boolean();
        assert!(g.add_rule("BOOL", "Maybe", None, 0.0).is_err());
        assert!(g.add_rule("BOOL", "Maybe", None, -1.0).is_err());
        assert!(g.add_rule("BOOL", "Maybe", None, std::f64::NAN).is_err());
        assert_eq!(g.nrules(), 4);
    }

    #[test]
    fn queries() {
        let g = boolean();
        assert_eq!(g.nonterminals(), &["START".to_string(), "BOOL".to_string()]);
        assert!(g.is_nonterminal("BOOL"));
        assert!(!g.is_nonterminal("True"));
        assert_eq!(g.rules_for("BOOL").unwrap().len(), 3);
        assert!(g.rules_for("NUMBER").is_err());
        let t = g.rule_by_name("True").unwrap();
        assert!(g.is_terminal_rule(t));
        assert!(!g.is_terminal_rule(g.rule_by_name("and_").unwrap()));
        assert_eq!(g.depth_to_terminal("BOOL"), Some(0));
        assert_eq!(g.depth_to_terminal("START"), Some(1));
        assert_eq!(g.depth_to_terminal("x"), Some(0));
    }

    #[test]
    fn renormalize_is_idempotent() {
        let mut g = boolean();
        g.add_rule("BOOL", "Maybe", None, 3.0).unwrap();
        g.renormalize();
        let ws = g.rules_for("BOOL").unwrap().iter().map(|r| r.weight).collect::<Vec<_>>();
        assert!((ws.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((ws[3] - 0.5).abs() < 1e-12);
        g.renormalize();
        let ws2 = g.rules_for("BOOL").unwrap().iter().map(|r| r.weight).collect::<Vec<_>>();
        assert_eq!(ws, ws2);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let g = boolean();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            match g.generate_limited("START", GenerationLimit::Depth(3), &mut rng) {
                Ok(tree) => assert!(tree.depth() <= 3),
                Err(e) => assert_eq!(e, SampleError::SizeExceeded),
            }
            match g.generate_limited("START", GenerationLimit::TotalSize(5), &mut rng) {
                Ok(tree) => assert!(tree.count_nodes() <= 5),
                Err(e) => assert_eq!(e, SampleError::SizeExceeded),
            }
        }
    }

    #[test]
    fn limited_generation_keeps_the_prior_of_leaves() {
        let mut g = boolean();
        g.max_depth = 6;
        let mut rng = StdRng::seed_from_u64(10_000);
        let n = 10_000;
        let mut leaves = 0;
        for _ in 0..n {
            match g.generate_limited("START", GenerationLimit::TotalSize(30), &mut rng) {
                Ok(tree) => {
                    assert!(tree.depth() <= 6);
                    assert!(tree.count_nodes() <= 30);
                    if tree.children().all(|c| c.is_leaf()) {
                        leaves += 1;
                    }
                }
                Err(e) => assert_eq!(e, SampleError::SizeExceeded),
            }
        }
        // A leaf is chosen first with probability 2/3 and never hits a limit.
        let fraction = leaves as f64 / n as f64;
        assert!((fraction - 2.0 / 3.0).abs() < 0.02, "{}", fraction);
    }

    #[test]
    fn terminals_generate_themselves() {
        let g = boolean();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            g.generate_symbol("True", &mut rng).unwrap(),
            Arg::Terminal("True".to_string())
        );
        assert_eq!(
            g.generate("True", &mut rng).unwrap_err(),
            SampleError::Grammar(GrammarError::UnknownNonterminal("True".to_string()))
        );
        match g.generate_symbol("BOOL", &mut rng).unwrap() {
            Arg::Node(tree) => assert_eq!(tree.returntype, "BOOL"),
            Arg::Terminal(t) => panic!("expected a tree, got {}", t),
        }
    }

    #[test]
    fn enumerated_mass_matches_escape_probability() {
        let g = boolean();
        // q_d: the probability that a BOOL has depth at most d.
        let mut q = 2.0 / 3.0;
        for d in 0..4 {
            let mass = g
                .enumerate(d, "BOOL")
                .map(|t| g.log_probability(&t).unwrap().exp())
                .sum::<f64>();
            assert!((mass - q).abs() < 1e-9, "depth {}: {} vs {}", d, mass, q);
            q = 2.0 / 3.0 + q * q / 3.0;
        }
    }

    #[test]
    fn bound_variables_share_the_mass() {
        let mut g = Grammar::new("EXPR");
        g.add_binder("EXPR", "lambda", Some(vec!["EXPR"]), 1.0, BinderSpec::new("EXPR"))
            .unwrap();
        g.add_rule("EXPR", "x", None, 1.0).unwrap();
        let mass = g
            .enumerate(1, "EXPR")
            .map(|t| g.log_probability(&t).unwrap().exp())
            .sum::<f64>();
        // x, then lambda over x (1/12) or its own variable (10/12).
        assert!((mass - 23.0 / 24.0).abs() < 1e-12);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let tree = g.generate("EXPR", &mut rng).unwrap();
            assert!(g.log_probability(&tree).unwrap().is_finite());
        }
    }

    #[test]
    fn escaped_variables_are_scope_violations() {
        let mut g = Grammar::new("EXPR");
        g.add_binder("EXPR", "lambda", Some(vec!["EXPR"]), 1.0, BinderSpec::new("EXPR"))
            .unwrap();
        g.add_rule("EXPR", "x", None, 1.0).unwrap();
        // lambda y0: y0
        let tree = g.unpack("02").unwrap();
        let body = tree.get(&[0]).unwrap().clone();
        match g.log_probability(&body) {
            Err(GrammarError::ScopeViolation(name)) => assert_eq!(name, body.name),
            other => panic!("expected a scope violation, got {:?}", other),
        }
        assert!(g.log_probability_at(&tree, &[0]).unwrap().is_finite());
    }

    #[test]
    fn single_probability_is_local() {
        let g = boolean();
        let mut rng = StdRng::seed_from_u64(3);
        let tree = g.generate("START", &mut rng).unwrap();
        let lp = g.single_probability(&tree, &[0]).unwrap();
        assert!((lp - (1.0f64 / 3.0).ln()).abs() < 1e-12);
        assert_eq!(g.single_probability(&tree, &[]).unwrap(), 0.0);
        assert!(g.single_probability(&tree, &[5]).is_err());
    }
}
