//! FIRST and FOLLOW set computation.

use crate::grammar::{NonterminalID, SymbolID, TaggedGrammar, TerminalID, TerminalSet};
use crate::types::Map;

/// FIRST sets of the grammar's nonterminals.
#[derive(Debug)]
pub struct FirstSets {
    first: Map<NonterminalID, TerminalSet>,
}

impl FirstSets {
    pub fn new(g: &TaggedGrammar) -> Self {
        let mut first: Map<NonterminalID, TerminalSet> = g
            .nonterminals
            .keys()
            .map(|&n| (n, TerminalSet::default()))
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for p in g.productions.values() {
                let mut added = TerminalSet::default();
                for symbol in &p.right {
                    match symbol {
                        SymbolID::T(t) => {
                            added.insert(*t);
                            break;
                        }
                        SymbolID::N(n) => {
                            added.union_with(&first[n]);
                            if !g.nullables.contains(n) {
                                break;
                            }
                        }
                    }
                }
                let slot = &mut first[&p.left];
                let before = slot.len();
                slot.union_with(&added);
                changed |= slot.len() != before;
            }
        }

        Self { first }
    }

    pub fn get(&self, n: NonterminalID) -> &TerminalSet {
        &self.first[&n]
    }

    /// `FIRST(α)` for a symbol sequence.
    pub fn first_of_slice(&self, g: &TaggedGrammar, symbols: &[SymbolID]) -> TerminalSet {
        let mut res = TerminalSet::default();
        for symbol in symbols {
            match symbol {
                SymbolID::T(t) => {
                    res.insert(*t);
                    return res;
                }
                SymbolID::N(n) => {
                    res.union_with(&self.first[n]);
                    if !g.nullables.contains(n) {
                        return res;
                    }
                }
            }
        }
        res
    }

    /// `FIRST(α t)`, the lookahead contribution of the suffix `α` followed by
    /// the terminal `t`.
    pub fn first_of(&self, g: &TaggedGrammar, symbols: &[SymbolID], last: TerminalID) -> TerminalSet {
        let mut res = self.first_of_slice(g, symbols);
        if g.all_nullable(symbols) {
            res.insert(last);
        }
        res
    }
}

/// FOLLOW sets of the grammar's nonterminals.
#[derive(Debug)]
pub struct FollowSets {
    follow: Map<NonterminalID, TerminalSet>,
}

impl FollowSets {
    pub fn new(g: &TaggedGrammar, first_sets: &FirstSets) -> Self {
        let mut follow: Map<NonterminalID, TerminalSet> = g
            .nonterminals
            .keys()
            .map(|&n| (n, TerminalSet::default()))
            .collect();
        follow[&NonterminalID::START].insert(TerminalID::EOI);

        let mut changed = true;
        while changed {
            changed = false;
            for p in g.productions.values() {
                for (i, symbol) in p.right.iter().enumerate() {
                    let SymbolID::N(n) = symbol else { continue };
                    let rest = &p.right[i + 1..];
                    let mut added = first_sets.first_of_slice(g, rest);
                    if g.all_nullable(rest) {
                        added.union_with(&follow[&p.left]);
                    }
                    let slot = &mut follow[n];
                    let before = slot.len();
                    slot.union_with(&added);
                    changed |= slot.len() != before;
                }
            }
        }

        Self { follow }
    }

    pub fn get(&self, n: NonterminalID) -> &TerminalSet {
        &self.follow[&n]
    }
}
