//! Partial subtrees: trees whose arguments may be cut off and replaced by the
//! nonterminal they would expand.

use super::{Arg, Node};
use rand::Rng;

impl Node {
    /// A copy of this tree in which every argument subtree is independently
    /// cut off with probability `p`, leaving its return type as a terminal.
    /// The root is always kept.
    pub fn random_partial_subtree<R: Rng>(&self, p: f64, rng: &mut R) -> Node {
        let args = self.args.as_ref().map(|args| {
            args.iter()
                .map(|arg| match *arg {
                    Arg::Node(ref n) => {
                        if rng.gen_bool(p) {
                            Arg::Terminal(n.returntype.clone())
                        } else {
                            Arg::Node(n.random_partial_subtree(p, rng))
                        }
                    }
                    Arg::Terminal(ref t) => Arg::Terminal(t.clone()),
                })
                .collect()
        });
        Node {
            returntype: self.returntype.clone(),
            name: self.name.clone(),
            args,
            kind: self.kind.clone(),
        }
    }
    /// `true` if `pattern` matches this tree at the root, where a terminal in
    /// `pattern` matches any subtree whose return type it names.
    pub fn partial_subtree_root_match(&self, pattern: &Arg) -> bool {
        let pattern = match *pattern {
            Arg::Terminal(ref t) => return *t == self.returntype,
            Arg::Node(ref n) => n,
        };
        if self.returntype != pattern.returntype || self.name != pattern.name {
            return false;
        }
        match (self.args.as_ref(), pattern.args.as_ref()) {
            (None, None) => true,
            (Some(xs), Some(ys)) if xs.len() == ys.len() => {
                xs.iter().zip(ys).all(|(x, y)| match (x, y) {
                    (Arg::Node(x), y) => x.partial_subtree_root_match(y),
                    (Arg::Terminal(x), Arg::Terminal(y)) => x == y,
                    (Arg::Terminal(_), Arg::Node(_)) => false,
                })
            }
            _ => false,
        }
    }
    /// `true` if `pattern` matches at the root of some subtree.
    pub fn partial_subtree_match(&self, pattern: &Arg) -> bool {
        self.subnodes()
            .any(|(_, n)| n.partial_subtree_root_match(pattern))
    }
    /// Replace every leaf subtree with its return type. A tree that is
    /// itself a leaf becomes its return type.
    pub fn trim_leaves(&self) -> Arg {
        if self.is_leaf() {
            return Arg::Terminal(self.returntype.clone());
        }
        let args = self.args.as_ref().map(|args| {
            args.iter()
                .map(|arg| match *arg {
                    Arg::Node(ref n) => n.trim_leaves(),
                    Arg::Terminal(ref t) => Arg::Terminal(t.clone()),
                })
                .collect()
        });
        Arg::Node(Node {
            returntype: self.returntype.clone(),
            name: self.name.clone(),
            args,
            kind: self.kind.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::Grammar;
    use crate::tree::Arg;
    use rand::{rngs::StdRng, SeedableRng};

    fn boolean() -> Grammar {
        let mut g = Grammar::new("BOOL");
        g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0)
            .unwrap();
        g.add_rule("BOOL", "not_", Some(vec!["BOOL"]), 1.0).unwrap();
        g.add_rule("BOOL", "True", None, 1.0).unwrap();
        g.add_rule("BOOL", "False", None, 1.0).unwrap();
        g
    }

    #[test]
    fn partial_subtrees_match_their_source() {
        let g = boolean();
        // and_(not_(True), False)
        let tree = g.unpack("0123").unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let partial = tree.random_partial_subtree(0.5, &mut rng);
            assert!(tree.partial_subtree_root_match(&Arg::Node(partial.clone())));
            assert!(tree.partial_subtree_match(&Arg::Node(partial)));
        }
        let not_true = g.unpack("12").unwrap();
        assert!(tree.partial_subtree_match(&Arg::Node(not_true.clone())));
        assert!(!tree.partial_subtree_root_match(&Arg::Node(not_true)));
        assert!(tree.partial_subtree_root_match(&Arg::Terminal("BOOL".to_string())));
    }

    #[test]
    fn trim_leaves_cuts_the_fringe() {
        let g = boolean();
        let tree = g.unpack("0123").unwrap();
        match tree.trim_leaves() {
            Arg::Node(trimmed) => {
                assert_eq!(trimmed.to_string(), "and_(not_(BOOL), BOOL)");
                assert_eq!(trimmed.count_nodes(), 2);
            }
            Arg::Terminal(t) => panic!("trimmed to {}", t),
        }
        let leaf = g.unpack("2").unwrap();
        assert_eq!(leaf.trim_leaves(), Arg::Terminal("BOOL".to_string()));
    }
}
