use super::{Grammar, Rule, Signature};
use crate::tree::{Arg, Node};
use crate::{GrammarError, PackError};
use std::collections::HashMap;

const ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn encode(idx: usize) -> Result<char, PackError> {
    ALPHABET.chars().nth(idx).ok_or(PackError::Overflow(idx))
}

fn decode(c: char) -> Result<usize, PackError> {
    ALPHABET.find(c).ok_or(PackError::UnknownCharacter(c))
}

impl Grammar {
    /// The fixed rules in packing order: by nonterminal, then by insertion.
    fn packing_table(&self) -> Vec<&Rule> {
        self.nonterminals
            .iter()
            .filter_map(|nt| self.rules.get(nt))
            .flatten()
            .collect()
    }
    /// Encode `tree` as one character per node, in pre-order.
    ///
    /// Fixed rules are numbered in order. Each binder numbers its variable
    /// with the next free index while its arguments are packed, so the
    /// encoding is only meaningful to this grammar.
    ///
    /// ```
    /// # use lotinduction::grammar::Grammar;
    /// let mut g = Grammar::new("BOOL");
    /// g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0).unwrap();
    /// g.add_rule("BOOL", "True", None, 1.0).unwrap();
    /// g.add_rule("BOOL", "False", None, 1.0).unwrap();
    ///
    /// let tree = g.unpack("012").unwrap();
    /// assert_eq!(tree.to_string(), "and_(True, False)");
    /// assert_eq!(g.pack(&tree).unwrap(), "012");
    /// ```
    pub fn pack(&self, tree: &Node) -> Result<String, GrammarError> {
        let table = self.packing_table();
        let mut indices: HashMap<Signature, usize> = HashMap::with_capacity(table.len());
        for (i, rule) in table.iter().enumerate() {
            indices.entry(rule.signature()).or_insert(i);
        }
        let mut packed = String::new();
        let mut next = table.len();
        pack_node(tree, &mut indices, &mut next, &mut packed)?;
        Ok(packed)
    }
    /// Decode a tree rooted at the start symbol.
    pub fn unpack(&self, packed: &str) -> Result<Node, GrammarError> {
        self.unpack_from(packed, &self.start)
    }
    /// Decode a tree rooted at `nonterminal`.
    pub fn unpack_from(&self, packed: &str, nonterminal: &str) -> Result<Node, GrammarError> {
        let mut table = self.packing_table().into_iter().cloned().collect::<Vec<_>>();
        let mut chars = packed.chars();
        let tree = self.unpack_node(nonterminal, &mut chars, &mut table)?;
        match chars.count() {
            0 => Ok(tree),
            n => Err(PackError::TrailingInput(n).into()),
        }
    }
    fn unpack_node(
        &self,
        nonterminal: &str,
        chars: &mut std::str::Chars,
        table: &mut Vec<Rule>,
    ) -> Result<Node, GrammarError> {
        let idx = decode(chars.next().ok_or(PackError::Truncated)?)?;
        let rule = table
            .get(idx)
            .cloned()
            .ok_or(PackError::UnknownIndex(idx))?;
        if rule.nonterminal != nonterminal {
            return Err(PackError::Mismatch {
                expected: nonterminal.to_string(),
                found: rule.nonterminal,
            }
            .into());
        }
        let mut node = self.instantiate(&rule);
        if let Some(to) = rule.to {
            let restore = table.len();
            if let Some(bound) = node.bound_rule() {
                table.push(bound.clone());
            }
            let args = to
                .into_iter()
                .map(|symbol| {
                    if self.is_nonterminal(&symbol) {
                        self.unpack_node(&symbol, chars, table).map(Arg::Node)
                    } else {
                        Ok(Arg::Terminal(symbol))
                    }
                })
                .collect::<Result<Vec<_>, _>>();
            table.truncate(restore);
            node.args = Some(args?);
        }
        Ok(node)
    }
}

fn pack_node(
    node: &Node,
    indices: &mut HashMap<Signature, usize>,
    next: &mut usize,
    packed: &mut String,
) -> Result<(), GrammarError> {
    let signature = node.signature();
    let idx = match indices.get(&signature) {
        Some(&idx) => idx,
        None if node.is_use() => return Err(GrammarError::ScopeViolation(node.name.clone())),
        None => return Err(GrammarError::Match { signature, count: 0 }),
    };
    packed.push(encode(idx)?);
    let bound = node.bound_rule().map(Rule::signature);
    if let Some(ref bound) = bound {
        indices.insert(bound.clone(), *next);
        *next += 1;
    }
    let result = node
        .children()
        .try_for_each(|child| pack_node(child, indices, next, packed));
    if let Some(bound) = bound {
        indices.remove(&bound);
        *next -= 1;
    }
    result
}
