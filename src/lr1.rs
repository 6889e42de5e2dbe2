//! Canonical LR(1) automaton construction.

use crate::first::FirstSets;
use crate::grammar::{
    NonterminalID, ProductionID, SymbolID, TaggedGrammar, TerminalID, TerminalSet,
};
use crate::lr0::StateID;
use crate::types::{Map, Set};
use std::collections::VecDeque;

/// An LR(0) item core annotated with a single lookahead terminal. States
/// carry one item per lookahead; consumers union the lookaheads of items
/// sharing a core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LR1Item {
    pub production: ProductionID,
    pub index: u16,
    pub lookahead: TerminalID,
}

#[derive(Debug)]
pub struct LR1State {
    /// Kernel plus closure.
    pub items: Set<LR1Item>,
    pub shifts: Map<TerminalID, StateID>,
    pub gotos: Map<NonterminalID, StateID>,
    pub reduces: Map<ProductionID, TerminalSet>,
    pub accept: bool,
}

#[derive(Debug)]
pub struct LR1Automaton {
    pub states: Map<StateID, LR1State>,
}

/// Calculate the canonical LR(1) automaton based on the specified grammar.
///
/// Discovery mirrors the LR(0) construction, but states whose cores agree
/// while their lookaheads differ stay distinct.
#[tracing::instrument(skip_all)]
pub fn lr1(g: &TaggedGrammar, first_sets: &FirstSets) -> LR1Automaton {
    let mut states = Map::<StateID, LR1State>::default();
    let mut state_id = {
        let mut next_state_id = 0;
        move || {
            let id = StateID::from_raw(next_state_id);
            next_state_id += 1;
            id
        }
    };

    let mut pending_states = VecDeque::<(StateID, Vec<LR1Item>)>::new();
    pending_states.push_back((
        state_id(),
        vec![LR1Item {
            production: ProductionID::ACCEPT,
            index: 0,
            lookahead: TerminalID::EOI,
        }],
    ));

    let mut new_kernels = Map::<SymbolID, Set<LR1Item>>::default();
    let mut isocores = Map::<Vec<LR1Item>, StateID>::default();
    while let Some((current, kernels)) = pending_states.pop_front() {
        let mut items: Set<LR1Item> = kernels.iter().copied().collect();
        closure(g, first_sets, &mut items);

        let mut reduces = Map::<ProductionID, TerminalSet>::default();
        let mut accept = false;
        new_kernels.clear();
        for item in &items {
            let production = g.production(item.production);
            match production.right.get::<usize>(item.index.into()) {
                Some(&SymbolID::T(TerminalID::EOI)) => {
                    accept = true;
                }
                Some(sym) => {
                    let new_kernel = new_kernels.entry(*sym).or_default();
                    new_kernel.insert(LR1Item {
                        index: item.index + 1,
                        ..*item
                    });
                }
                None => {
                    reduces.entry(item.production).or_default().insert(item.lookahead);
                }
            }
        }

        let mut shifts = Map::default();
        let mut gotos = Map::default();
        for (sym, new_kernel) in new_kernels.drain(..) {
            let mut new_kernel: Vec<_> = new_kernel.into_iter().collect();
            new_kernel.sort_unstable();
            let next = match isocores.get(&new_kernel) {
                Some(id) => *id,
                None => {
                    let id = state_id();
                    isocores.insert(new_kernel.clone(), id);
                    pending_states.push_back((id, new_kernel));
                    id
                }
            };
            match sym {
                SymbolID::T(t) => {
                    shifts.insert(t, next);
                }
                SymbolID::N(n) => {
                    gotos.insert(n, next);
                }
            }
        }

        states.insert(
            current,
            LR1State {
                items,
                shifts,
                gotos,
                reduces,
                accept,
            },
        );
    }

    tracing::trace!("LR(1) automaton has {} states", states.len());
    LR1Automaton { states }
}

/// Saturate the item set: `[A -> α . B β, t]` introduces `[B -> . γ, x]` for
/// every production of `B` and every `x` in `FIRST(β t)`.
pub(crate) fn closure(g: &TaggedGrammar, first_sets: &FirstSets, items: &mut Set<LR1Item>) {
    let mut changed = true;
    while changed {
        changed = false;

        let mut added = Set::default();
        for item in &*items {
            let production = g.production(item.production);
            let Some(SymbolID::N(n)) = production.right.get::<usize>(item.index.into()) else {
                continue;
            };
            let beta = &production.right[usize::from(item.index) + 1..];
            for x in first_sets.first_of(g, beta, item.lookahead).iter() {
                for (id, p) in &g.productions {
                    if p.left != *n {
                        continue;
                    }
                    added.insert(LR1Item {
                        production: *id,
                        index: 0,
                        lookahead: x,
                    });
                }
            }
        }

        for item in added.drain(..) {
            changed |= items.insert(item);
        }
    }
}
