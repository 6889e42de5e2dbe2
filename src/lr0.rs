//! LR(0) automaton construction.

use crate::grammar::{NonterminalID, ProductionID, SymbolID, TaggedGrammar, TerminalID};
use crate::types::{Map, Set};
use std::{collections::VecDeque, fmt};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u16);
impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}
impl StateID {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

/// The LR(0) item, a.k.a. LR item core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LR0Item {
    pub production: ProductionID,
    pub index: u16,
}

#[derive(Debug, Clone)]
pub struct LR0State {
    pub kernels: Vec<LR0Item>,
    pub shifts: Map<TerminalID, StateID>,
    pub gotos: Map<NonterminalID, StateID>,
    pub reduces: Set<ProductionID>,
    /// Whether the state holds the item `#Start -> S . #EOI`.
    pub accept: bool,
    pub predecessors: Map<StateID, SymbolID>,
}

#[derive(Debug)]
pub struct LR0Automaton {
    pub states: Map<StateID, LR0State>,
}

/// Calculate the LR(0) automaton based on the specified grammar.
///
/// States are discovered breadth-first from the closure of the augmented
/// start item and receive dense IDs in discovery order. The end-of-input
/// marker is never shifted; the item `#Start -> S . #EOI` marks its state as
/// accepting instead.
#[tracing::instrument(skip_all)]
pub fn lr0(g: &TaggedGrammar) -> LR0Automaton {
    let nonkernels = nonkernels(g);

    let mut states = Map::<StateID, LR0State>::default();
    let mut state_id = {
        let mut next_state_id = 0;
        move || {
            let id = StateID(next_state_id);
            next_state_id += 1;
            id
        }
    };

    let mut pending_states = VecDeque::<(StateID, Vec<LR0Item>)>::new();
    pending_states.push_back((
        state_id(),
        vec![LR0Item {
            production: ProductionID::ACCEPT,
            index: 0,
        }],
    ));

    let mut items = Set::default();
    let mut new_kernels = Map::<SymbolID, Set<LR0Item>>::default();
    let mut isocores = Map::<Vec<LR0Item>, StateID>::default();
    let mut predecessors = Map::<StateID, Map<StateID, SymbolID>>::default();
    while let Some((current, kernels)) = pending_states.pop_front() {
        items.clear();
        for kernel in &kernels {
            items.insert(*kernel);
            let production = g.production(kernel.production);
            if let Some(SymbolID::N(n)) = production.right.get::<usize>(kernel.index.into()) {
                items.extend(&nonkernels[n]);
            }
        }

        let mut reduces = Set::default();
        let mut accept = false;
        new_kernels.clear();
        for item in items.drain(..) {
            let production = g.production(item.production);
            match production.right.get::<usize>(item.index.into()) {
                Some(&SymbolID::T(TerminalID::EOI)) => {
                    accept = true;
                }
                Some(sym) => {
                    let new_kernel = new_kernels.entry(*sym).or_default();
                    new_kernel.insert(LR0Item {
                        index: item.index + 1,
                        ..item
                    });
                }
                None => {
                    reduces.insert(item.production);
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
            predecessors.entry(next).or_default().insert(current, sym);
        }

        states.insert(
            current,
            LR0State {
                kernels,
                shifts,
                gotos,
                reduces,
                accept,
                predecessors: Map::default(),
            },
        );
    }

    for (id, predecessors) in predecessors {
        states[&id].predecessors = predecessors;
    }

    tracing::trace!("LR(0) automaton has {} states", states.len());
    LR0Automaton { states }
}

/// The closure items `[B -> . γ]` introduced by each nonterminal, saturated
/// transitively.
pub(crate) fn nonkernels(g: &TaggedGrammar) -> Map<NonterminalID, Set<LR0Item>> {
    let mut nonkernels: Map<NonterminalID, Set<LR0Item>> = Map::default();
    for &n in g.nonterminals.keys() {
        let mut items = Set::default();
        for (id, p) in &g.productions {
            if p.left != n {
                continue;
            }
            items.insert(LR0Item {
                production: *id,
                index: 0,
            });
        }

        let mut added = Set::default();
        loop {
            added.clear();
            for item in &items {
                let production = g.production(item.production);
                if let Some(SymbolID::N(n)) = production.right.first() {
                    for (id, p) in &g.productions {
                        if p.left != *n {
                            continue;
                        }
                        added.insert(LR0Item {
                            production: *id,
                            index: 0,
                        });
                    }
                }
            }

            let changed = added
                .drain(..)
                .fold(false, |changed, item| changed | items.insert(item));
            if !changed {
                break;
            }
        }
        nonkernels.insert(n, items);
    }
    nonkernels
}
