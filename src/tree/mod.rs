//! (representation) Expression trees generated from a [`Grammar`].
//!
//! A [`Node`] owns its arguments. There are no parent pointers: a node is
//! addressed by its [`Place`], the sequence of argument indices leading to it
//! from the root, and its parent is simply the place with the last index
//! removed. Grafting a new subtree at a place therefore keeps it attached to
//! the same parent.
//!
//! [`Grammar`]: ../grammar/struct.Grammar.html
//! [`Node`]: struct.Node.html
//! [`Place`]: type.Place.html

mod subtrees;

use crate::grammar::{Rule, Signature};
use crate::utilities::{nicelog, weighted_choice};
use crate::SampleError;
use itertools::Itertools;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The path of argument indices from the root to a node.
pub type Place = Vec<usize>;

/// An argument of a [`Node`]: either a subtree or an opaque terminal string.
///
/// [`Node`]: struct.Node.html
#[derive(Debug, Clone)]
pub enum Arg {
    Node(Node),
    Terminal(String),
}

/// What kind of rule produced a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Plain,
    /// The node introduced a bound variable; this is the rule it activated.
    Binder(Box<Rule>),
    /// The node is a use of a bound variable. Its name is the variable's rule name.
    Use,
}

/// A node in an expression tree.
///
/// `args == None` marks a terminal, while `args == Some(vec![])` marks a
/// zero-arity call.
#[derive(Debug, Clone)]
pub struct Node {
    pub returntype: String,
    pub name: String,
    pub args: Option<Vec<Arg>>,
    pub kind: NodeKind,
}

/// Pre-order iteration over the nodes of a tree, yielding each node's [`Place`].
///
/// [`Place`]: type.Place.html
pub struct Subnodes<'a> {
    stack: Vec<(Place, &'a Node)>,
}
impl<'a> Iterator for Subnodes<'a> {
    type Item = (Place, &'a Node);
    fn next(&mut self) -> Option<Self::Item> {
        let (place, node) = self.stack.pop()?;
        for (i, child) in node.children_with_index().collect_vec().into_iter().rev() {
            let mut child_place = place.clone();
            child_place.push(i);
            self.stack.push((child_place, child));
        }
        Some((place, node))
    }
}

impl Arg {
    pub fn as_node(&self) -> Option<&Node> {
        match *self {
            Arg::Node(ref n) => Some(n),
            Arg::Terminal(_) => None,
        }
    }
    /// The symbol this argument fills: a node's return type or the terminal itself.
    pub fn symbol(&self) -> &str {
        match *self {
            Arg::Node(ref n) => &n.returntype,
            Arg::Terminal(ref s) => s,
        }
    }
    fn label(&self) -> &str {
        match *self {
            Arg::Node(ref n) => &n.name,
            Arg::Terminal(ref s) => s,
        }
    }
}
impl PartialEq for Arg {
    fn eq(&self, other: &Arg) -> bool {
        match (self, other) {
            (Arg::Node(a), Arg::Node(b)) => a == b,
            (Arg::Terminal(a), Arg::Terminal(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Arg {}

impl Node {
    pub fn new(returntype: &str, name: &str, args: Option<Vec<Arg>>, kind: NodeKind) -> Self {
        Node {
            returntype: returntype.to_string(),
            name: name.to_string(),
            args,
            kind,
        }
    }
    /// The `(nonterminal, name, expansion)` triple that pairs this node with
    /// the rule that produced it.
    pub fn signature(&self) -> Signature {
        Signature {
            nonterminal: self.returntype.clone(),
            name: self.name.clone(),
            expansion: self
                .args
                .as_ref()
                .map(|args| args.iter().map(|a| a.symbol().to_string()).collect()),
        }
    }
    /// The number of arguments, or `None` for terminals.
    pub fn nargs(&self) -> Option<usize> {
        self.args.as_ref().map(|args| args.len())
    }
    /// The rule this node activated, if it is a binder.
    pub fn bound_rule(&self) -> Option<&Rule> {
        match self.kind {
            NodeKind::Binder(ref rule) => Some(rule),
            _ => None,
        }
    }
    pub fn is_binder(&self) -> bool {
        matches!(self.kind, NodeKind::Binder(_))
    }
    pub fn is_use(&self) -> bool {
        matches!(self.kind, NodeKind::Use)
    }
    /// The subtrees immediately below this node.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.args.iter().flatten().filter_map(Arg::as_node)
    }
    /// The subtrees immediately below this node, with their argument index.
    pub fn children_with_index(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.args
            .iter()
            .flatten()
            .enumerate()
            .filter_map(|(i, a)| a.as_node().map(|n| (i, n)))
    }
    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.args.iter_mut().flatten().filter_map(|a| match a {
            Arg::Node(n) => Some(n),
            Arg::Terminal(_) => None,
        })
    }
    /// `true` if no argument is a subtree.
    pub fn is_leaf(&self) -> bool {
        self.children().next().is_none()
    }
    /// Every node in the tree, in pre-order, with its place.
    pub fn subnodes(&self) -> Subnodes<'_> {
        Subnodes {
            stack: vec![(vec![], self)],
        }
    }
    pub fn get(&self, place: &[usize]) -> Option<&Node> {
        place.iter().try_fold(self, |node, &i| {
            node.args.as_ref().and_then(|args| args.get(i)).and_then(Arg::as_node)
        })
    }
    pub fn get_mut(&mut self, place: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &i in place {
            node = match node.args.as_mut().and_then(|args| args.get_mut(i)) {
                Some(Arg::Node(n)) => n,
                _ => return None,
            };
        }
        Some(node)
    }
    /// Graft `replacement` at `place`, returning the subtree it displaced.
    pub fn replace(&mut self, place: &[usize], replacement: Node) -> Option<Node> {
        self.get_mut(place)
            .map(|node| std::mem::replace(node, replacement))
    }
    /// The rules activated by binders strictly above `place`, outermost first.
    pub fn binders_above(&self, place: &[usize]) -> Vec<&Rule> {
        let mut rules = Vec::with_capacity(place.len());
        let mut node = self;
        for &i in place {
            if let Some(rule) = node.bound_rule() {
                rules.push(rule);
            }
            match node.args.as_ref().and_then(|args| args.get(i)) {
                Some(Arg::Node(n)) => node = n,
                _ => break,
            }
        }
        rules
    }
    pub fn count_nodes(&self) -> usize {
        1 + self.children().map(Node::count_nodes).sum::<usize>()
    }
    pub fn count_leaves(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children().map(Node::count_leaves).sum()
        }
    }
    /// The number of embeddings below this node; leaves have depth 0.
    pub fn depth(&self) -> usize {
        self.children()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }
    pub fn contains_function(&self, name: &str) -> bool {
        self.subnodes().any(|(_, n)| n.name == name)
    }
    /// For binders, `true` if the introduced variable is used below.
    pub fn uses_bound_variable(&self) -> bool {
        match self.bound_rule() {
            Some(rule) => self
                .children()
                .flat_map(|c| c.subnodes())
                .any(|(_, n)| n.is_use() && n.name == rule.name),
            None => false,
        }
    }
    /// The names of bound variables used below but introduced above this node.
    pub fn free_variables(&self) -> HashSet<String> {
        let mut free = HashSet::new();
        self.collect_free(&mut vec![], &mut free);
        free
    }
    fn collect_free<'a>(&'a self, bound: &mut Vec<&'a str>, free: &mut HashSet<String>) {
        if self.is_use() && !bound.contains(&self.name.as_str()) {
            free.insert(self.name.clone());
        }
        let n_bound = bound.len();
        if let Some(rule) = self.bound_rule() {
            bound.push(&rule.name);
        }
        for child in self.children() {
            child.collect_free(bound, free);
        }
        bound.truncate(n_bound);
    }
    /// Deep-copy this subtree, giving every binder in it a fresh variable
    /// name and renaming its uses to match.
    pub fn uniquify_bound_variables(&self) -> Node {
        let mut node = self.clone();
        node.uniquify(&mut HashMap::new());
        node
    }
    fn uniquify(&mut self, remap: &mut HashMap<String, String>) {
        match self.kind {
            NodeKind::Binder(ref mut rule) => {
                let fresh = crate::grammar::fresh_bound_name();
                remap.insert(rule.name.clone(), fresh.clone());
                rule.name = fresh;
            }
            NodeKind::Use => {
                if let Some(name) = remap.get(&self.name) {
                    self.name = name.clone();
                }
            }
            NodeKind::Plain => (),
        }
        for child in self.children_mut() {
            child.uniquify(remap);
        }
    }
    /// The sum of `weight` over every node.
    pub fn sample_node_normalizer<F>(&self, weight: F) -> f64
    where
        F: Fn(&[usize], &Node) -> f64,
    {
        self.subnodes().map(|(p, n)| weight(&p, n)).sum()
    }
    /// The log-probability that [`sample_subnode`] chooses the node at `place`.
    ///
    /// [`sample_subnode`]: #method.sample_subnode
    pub fn sampling_log_probability<F>(&self, place: &[usize], weight: F) -> f64
    where
        F: Fn(&[usize], &Node) -> f64,
    {
        match self.get(place) {
            Some(node) => nicelog(weight(place, node)) - nicelog(self.sample_node_normalizer(weight)),
            None => std::f64::NEG_INFINITY,
        }
    }
    /// Choose a node with probability proportional to `weight`, returning its
    /// place and the log-probability of the choice.
    pub fn sample_subnode<F, R>(&self, weight: F, rng: &mut R) -> Result<(Place, f64), SampleError>
    where
        F: Fn(&[usize], &Node) -> f64,
        R: Rng,
    {
        let (places, weights): (Vec<_>, Vec<_>) = self
            .subnodes()
            .map(|(p, n)| {
                let w = weight(&p, n);
                (p, w)
            })
            .unzip();
        let z = weights.iter().sum::<f64>();
        if !(z > 0.0) {
            return Err(SampleError::SamplingExhausted);
        }
        let idx = weighted_choice(&weights, rng).ok_or(SampleError::SamplingExhausted)?;
        let lp = weights[idx].ln() - z.ln();
        Ok((places[idx].clone(), lp))
    }
    /// `true` if, for every node named in `symmetric`, the arguments appear
    /// in sorted order. Useful for discarding commuted duplicates.
    pub fn is_canonical_order(&self, symmetric: &[&str]) -> bool {
        if let Some(args) = self.args.as_ref() {
            if symmetric.contains(&self.name.as_str())
                && args.windows(2).any(|w| w[0].label() > w[1].label())
            {
                return false;
            }
        }
        self.children().all(|c| c.is_canonical_order(symmetric))
    }
    /// The string used for equality: every node is annotated with its return
    /// type and bound variables are named by the depth of their binder.
    pub fn full_string(&self) -> String {
        let mut s = String::new();
        self.write_full(0, &mut HashMap::new(), &mut s);
        s
    }
    /// The node at `place` and canonical names for the variables bound above it.
    fn context(&self, place: &[usize]) -> Option<(&Node, HashMap<String, String>)> {
        let mut names = HashMap::new();
        let mut node = self;
        for (d, &i) in place.iter().enumerate() {
            if let Some(rule) = node.bound_rule() {
                names.insert(rule.name.clone(), format!("{}{}'", rule.prefix(), d));
            }
            node = node.args.as_ref()?.get(i)?.as_node()?;
        }
        Some((node, names))
    }
    /// Like [`full_string`] for the subtree at `place`, except that variables
    /// bound above `place` are named by the depth of their binder in `self`.
    /// Subtrees of two trees that agree above them compare equal exactly when
    /// these strings do, wherever the subtrees sit.
    ///
    /// [`full_string`]: #method.full_string
    pub fn full_string_at(&self, place: &[usize]) -> Option<String> {
        let (node, mut names) = self.context(place)?;
        let mut s = String::new();
        node.write_full(0, &mut names, &mut s);
        Some(s)
    }
    /// The canonical form of the node at `place` alone: its name, return
    /// type, kind and argument symbols.
    pub fn head_string_at(&self, place: &[usize]) -> Option<String> {
        let (node, names) = self.context(place)?;
        let name = match names.get(&node.name) {
            Some(name) if node.is_use() => name,
            _ => &node.name,
        };
        let marker = if node.is_binder() { ":" } else { "" };
        let args = node
            .args
            .as_ref()
            .map(|args| format!("({})", args.iter().map(Arg::symbol).join(", ")))
            .unwrap_or_default();
        Some(format!("{}<{}>{}{}", name, node.returntype, marker, args))
    }
    fn write_full(&self, d: usize, names: &mut HashMap<String, String>, s: &mut String) {
        let introduced = self.bound_rule().map(|rule| {
            let bvn = format!("{}{}", rule.prefix(), d);
            names.insert(rule.name.clone(), bvn.clone());
            (rule.name.clone(), bvn)
        });
        let name = if self.is_use() {
            names.get(&self.name).unwrap_or(&self.name).clone()
        } else {
            self.name.clone()
        };
        s.push_str(&format!("{}<{}>", name, self.returntype));
        if let Some((_, ref bvn)) = introduced {
            s.push(' ');
            s.push_str(bvn);
            s.push(':');
        }
        if let Some(args) = self.args.as_ref() {
            s.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                match *arg {
                    Arg::Node(ref n) => n.write_full(d + 1, names, s),
                    Arg::Terminal(ref t) => s.push_str(t),
                }
            }
            s.push(')');
        }
        if let Some((rule_name, _)) = introduced {
            names.remove(&rule_name);
        }
    }
    /// An s-expression rendering, e.g. `(lambda (y0) (and_ y0 True))`.
    pub fn scheme_string(&self) -> String {
        self.scheme(0, &mut HashMap::new())
    }
    fn scheme(&self, d: usize, names: &mut HashMap<String, String>) -> String {
        let bvn = self.bound_rule().map(|rule| {
            let bvn = format!("{}{}", rule.prefix(), d);
            names.insert(rule.name.clone(), bvn.clone());
            bvn
        });
        let name = if self.is_use() {
            names.get(&self.name).unwrap_or(&self.name).clone()
        } else {
            self.name.clone()
        };
        let s = match self.args.as_ref() {
            None => name,
            Some(args) => {
                let mut parts = vec![name];
                if let Some(ref bvn) = bvn {
                    parts.push(format!("({})", bvn));
                }
                parts.extend(args.iter().map(|a| match *a {
                    Arg::Node(ref n) => n.scheme(d + 1, names),
                    Arg::Terminal(ref t) => t.clone(),
                }));
                format!("({})", parts.join(" "))
            }
        };
        if let Some(rule) = self.bound_rule() {
            names.remove(&rule.name);
        }
        s
    }
    fn pretty(&self, d: usize, names: &mut HashMap<String, String>) -> String {
        let bvn = self.bound_rule().map(|rule| {
            let bvn = format!("{}{}", rule.prefix(), d);
            names.insert(rule.name.clone(), bvn.clone());
            bvn
        });
        let name = if self.is_use() {
            names.get(&self.name).unwrap_or(&self.name).clone()
        } else {
            self.name.clone()
        };
        let arg_strings = |names: &mut HashMap<String, String>| {
            self.args
                .iter()
                .flatten()
                .map(|a| match *a {
                    Arg::Node(ref n) => n.pretty(d + 1, names),
                    Arg::Terminal(ref t) => t.clone(),
                })
                .collect_vec()
        };
        let mut s = match self.args.as_ref() {
            None => name,
            Some(args) if self.name.is_empty() && args.len() == 1 => {
                arg_strings(names).pop().unwrap_or_default()
            }
            Some(_) if self.name.contains("%s") => {
                let mut s = name;
                for a in arg_strings(names) {
                    s = s.replacen("%s", &a, 1);
                }
                s
            }
            Some(args) if self.name == "lambda" && args.len() == 1 => format!(
                "lambda {}: {}",
                bvn.clone().unwrap_or_default(),
                arg_strings(names).join("")
            ),
            Some(_) => format!("{}({})", name, arg_strings(names).join(", ")),
        };
        if let Some(bvn) = bvn {
            s = s.replace("<BV>", &bvn);
        }
        if let Some(rule) = self.bound_rule() {
            names.remove(&rule.name);
        }
        s
    }
}
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pretty(0, &mut HashMap::new()))
    }
}
impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.full_string() == other.full_string()
    }
}
impl Eq for Node {}
impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_string().hash(state)
    }
}

/// The place of the parent of `place`, or `None` at the root.
pub fn parent_place(place: &[usize]) -> Option<&[usize]> {
    if place.is_empty() {
        None
    } else {
        Some(&place[..place.len() - 1])
    }
}
