//! Table-generation engine for LR-family parsers.
//!
//! Given a context-free [`Grammar`], the four builders compute the parser
//! states and fill the ACTION/GOTO tables of the corresponding automaton
//! family:
//!
//! - [`build_lr0`], the plain LR(0) skeleton with blanket reductions;
//! - [`build_slr1`], reductions restricted to FOLLOW of the left-hand side;
//! - [`build_lr1`], the canonical LR(1) automaton;
//! - [`build_lalr1`], LR(0) states upgraded with the LALR(1) look-ahead sets
//!   computed by DeRemer and Pennello's relational algorithm.
//!
//! Every builder is a pure function of the grammar value. Conflicting cells
//! never abort the build; they are published as [`ActionSet::Conflict`]
//! values and collected into [`Diagnostics`]. Structural grammar errors and
//! the non-LR(k) cycle condition are fatal.

mod digraph;
mod util;

pub mod first;
pub mod grammar;
pub mod lalr;
pub mod lr0;
pub mod lr1;
pub mod table;
pub mod types;

pub use crate::grammar::{Grammar, GrammarError, Production};
pub use crate::table::{Action, ActionSet, Conflict, Diagnostics, ParserTable};

use crate::first::{FirstSets, FollowSets};
use crate::grammar::{TaggedGrammar, TerminalSet};
use crate::types::Map;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// The `includes` relation has a cycle with a non-empty read set; the
    /// grammar is not LR(k) for any k.
    #[error("the grammar is not LR(k): lookahead cycle through the goto transition {0:?}")]
    NotLRk(table::NonterminalTransition),
}

/// Build the LR(0) parser table. Completed items reduce on every terminal.
pub fn build_lr0(grammar: &Grammar) -> Result<ParserTable, GrammarError> {
    let g = TaggedGrammar::build(grammar)?;
    let automaton = lr0::lr0(&g);

    let every_terminal: TerminalSet = g.terminals.keys().copied().collect();
    let mut lookaheads = Map::default();
    for (&state, s) in &automaton.states {
        for &production in &s.reduces {
            lookaheads.insert(
                lalr::Reduce { state, production },
                every_terminal.clone(),
            );
        }
    }

    Ok(table::from_lr0(&g, &automaton, &lookaheads, None))
}

/// Build the SLR(1) parser table: the LR(0) automaton with each reduction
/// restricted to the FOLLOW set of its left-hand side.
pub fn build_slr1(grammar: &Grammar) -> Result<ParserTable, GrammarError> {
    let g = TaggedGrammar::build(grammar)?;
    let automaton = lr0::lr0(&g);
    let first_sets = FirstSets::new(&g);
    let follow_sets = FollowSets::new(&g, &first_sets);

    let mut lookaheads = Map::default();
    for (&state, s) in &automaton.states {
        for &production in &s.reduces {
            let left = g.production(production).left;
            lookaheads.insert(
                lalr::Reduce { state, production },
                follow_sets.get(left).clone(),
            );
        }
    }

    Ok(table::from_lr0(&g, &automaton, &lookaheads, None))
}

/// Build the canonical LR(1) parser table.
pub fn build_lr1(grammar: &Grammar) -> Result<ParserTable, GrammarError> {
    let g = TaggedGrammar::build(grammar)?;
    let first_sets = FirstSets::new(&g);
    let automaton = lr1::lr1(&g, &first_sets);
    Ok(table::from_lr1(&g, &automaton))
}

/// Build the LALR(1) parser table: the LR(0) automaton with each reduction
/// restricted to its LA set.
pub fn build_lalr1(grammar: &Grammar) -> Result<ParserTable, BuildError> {
    let g = TaggedGrammar::build(grammar)?;
    let automaton = lr0::lr0(&g);
    let lalr_data = lalr::lalr(&g, &automaton)?;
    let first_sets = FirstSets::new(&g);
    Ok(table::from_lr0(
        &g,
        &automaton,
        &lalr_data.lookaheads,
        Some((&lalr_data.item_lookaheads, &first_sets)),
    ))
}
