//! Context-free grammars and their tagged in-core representation.

use crate::types::{Map, Set};
use std::fmt;

/// A grammar as supplied by a front-end.
///
/// Symbols are plain names. Right-hand sides are resolved against the
/// declared terminal and nonterminal lists when the grammar is tagged;
/// nonterminals take precedence when a name is declared as both.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub terminals: Vec<String>,
    pub nonterminals: Vec<String>,
    pub start: String,
    pub productions: Vec<Production>,
}

/// A name-based production rule.
#[derive(Debug, Clone)]
pub struct Production {
    pub lhs: String,
    pub rhs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("the start symbol is not a declared nonterminal")]
    NoStartSymbol,

    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    #[error("production {1:?} duplicates {0:?}")]
    DuplicateProduction(ProductionID, ProductionID),
}

// ==== tagged symbols =====

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalID(u16);
impl TerminalID {
    /// Reserved tag for the end-of-input marker.
    pub const EOI: Self = Self(0);
    const OFFSET: u16 = 1;
}
impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EOI => write!(f, "T#End"),
            _ => write!(f, "T#{:03}", self.0),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NonterminalID(u16);
impl NonterminalID {
    /// Reserved tag for the augmented start symbol.
    pub const START: Self = Self(0);
    const OFFSET: u16 = 1;
}
impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::START => write!(f, "N#Start"),
            _ => write!(f, "N#{:03}", self.0),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}
impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T(t) => write!(f, "{:?}", t),
            Self::N(n) => write!(f, "{:?}", n),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionID(u16);
impl ProductionID {
    /// Tag of the augmented production `#Start -> S #EOI`. User productions
    /// are tagged starting from 1, in declaration order.
    pub const ACCEPT: Self = Self(0);
    const OFFSET: u16 = 1;

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}
impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::ACCEPT => write!(f, "P#Accept"),
            _ => write!(f, "P#{:03}", self.0),
        }
    }
}

/// A set of terminal tags backed by a bitset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}
impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.0.into())
    }
    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.0.into())
    }
    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn is_superset(&self, other: &Self) -> bool {
        other.inner.is_subset(&self.inner)
    }
    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner
            .iter()
            .map(|raw| raw.try_into().map(TerminalID).unwrap())
    }
}
impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| usize::from(t.0)).collect(),
        }
    }
}
impl crate::digraph::Set for TerminalSet {
    fn union_with(&mut self, other: &Self) {
        self.union_with(other)
    }
}

/// A production with its symbols resolved to tags.
#[derive(Debug)]
pub struct TaggedProduction {
    pub left: NonterminalID,
    pub right: Vec<SymbolID>,
}

impl TaggedProduction {
    pub fn display<'g>(&'g self, g: &'g TaggedGrammar) -> impl fmt::Display + 'g {
        crate::util::display_fn(move |f| {
            write!(f, "{} ->", g.nonterminals[&self.left])?;
            if self.right.is_empty() {
                f.write_str(" ε")?;
            }
            for r in &self.right {
                match r {
                    SymbolID::N(n) => write!(f, " {}", g.nonterminals[n])?,
                    SymbolID::T(t) => write!(f, " {}", g.terminals[t])?,
                }
            }
            Ok(())
        })
    }
}

/// The augmented, integer-tagged form of a [`Grammar`].
///
/// Tags are dense and assigned in declaration order, so two builds of the
/// same grammar value use identical tags. The synthetic `#EOI` terminal and
/// `#Start` nonterminal occupy tag 0 of their alphabets, and the augmented
/// production `#Start -> S #EOI` occupies production tag 0.
#[derive(Debug)]
pub struct TaggedGrammar {
    pub terminals: Map<TerminalID, String>,
    pub nonterminals: Map<NonterminalID, String>,
    pub productions: Map<ProductionID, TaggedProduction>,
    pub start_symbol: NonterminalID,
    pub nullables: Set<NonterminalID>,
}

impl TaggedGrammar {
    pub fn build(grammar: &Grammar) -> Result<Self, GrammarError> {
        let mut terminals = Map::default();
        terminals.insert(TerminalID::EOI, "#EOI".to_owned());
        let mut terminal_tags = Map::<&str, TerminalID>::default();
        let mut next_terminal = TerminalID::OFFSET;
        for name in &grammar.terminals {
            terminal_tags.entry(name.as_str()).or_insert_with(|| {
                let id = TerminalID(next_terminal);
                next_terminal += 1;
                id
            });
        }
        for (&name, &id) in &terminal_tags {
            terminals.insert(id, name.to_owned());
        }

        let mut nonterminals = Map::default();
        nonterminals.insert(NonterminalID::START, "#Start".to_owned());
        let mut nonterminal_tags = Map::<&str, NonterminalID>::default();
        let mut next_nonterminal = NonterminalID::OFFSET;
        for name in &grammar.nonterminals {
            nonterminal_tags.entry(name.as_str()).or_insert_with(|| {
                let id = NonterminalID(next_nonterminal);
                next_nonterminal += 1;
                id
            });
        }
        for (&name, &id) in &nonterminal_tags {
            nonterminals.insert(id, name.to_owned());
        }

        let start_symbol = *nonterminal_tags
            .get(grammar.start.as_str())
            .ok_or(GrammarError::NoStartSymbol)?;

        let mut productions = Map::default();
        productions.insert(
            ProductionID::ACCEPT,
            TaggedProduction {
                left: NonterminalID::START,
                right: vec![SymbolID::N(start_symbol), SymbolID::T(TerminalID::EOI)],
            },
        );
        let mut next_production = ProductionID::OFFSET;
        for production in &grammar.productions {
            let left = *nonterminal_tags
                .get(production.lhs.as_str())
                .ok_or_else(|| GrammarError::UndefinedSymbol(production.lhs.clone()))?;
            let mut right = Vec::with_capacity(production.rhs.len());
            for name in &production.rhs {
                let symbol = if let Some(&n) = nonterminal_tags.get(name.as_str()) {
                    SymbolID::N(n)
                } else if let Some(&t) = terminal_tags.get(name.as_str()) {
                    SymbolID::T(t)
                } else {
                    return Err(GrammarError::UndefinedSymbol(name.clone()));
                };
                right.push(symbol);
            }

            let id = ProductionID(next_production);
            for (&prev, p) in &productions {
                if p.left == left && p.right == right {
                    return Err(GrammarError::DuplicateProduction(prev, id));
                }
            }
            productions.insert(id, TaggedProduction { left, right });
            next_production += 1;
        }

        let mut nullables = Set::default();
        loop {
            let mut changed = false;
            for p in productions.values() {
                if p.right
                    .iter()
                    .all(|s| matches!(s, SymbolID::N(n) if nullables.contains(n)))
                {
                    changed |= nullables.insert(p.left);
                }
            }
            if !changed {
                break;
            }
        }

        Ok(Self {
            terminals,
            nonterminals,
            productions,
            start_symbol,
            nullables,
        })
    }

    pub fn production(&self, id: ProductionID) -> &TaggedProduction {
        &self.productions[&id]
    }

    /// Whether every symbol of the slice derives the empty string. Terminals
    /// force false.
    pub fn all_nullable(&self, symbols: &[SymbolID]) -> bool {
        symbols
            .iter()
            .all(|s| matches!(s, SymbolID::N(n) if self.nullables.contains(n)))
    }
}

impl fmt::Display for TaggedGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#### terminals: ")?;
        for (i, t) in self.terminals.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "\n#### nonterminals: ")?;
        for (i, n) in self.nonterminals.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", n)?;
        }
        writeln!(f, "\n#### productions:")?;
        for p in self.productions.values() {
            writeln!(f, "- {}", p.display(self))?;
        }
        Ok(())
    }
}
