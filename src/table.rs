//! Parser tables, conflict detection and diagnostics.

use crate::first::FirstSets;
use crate::grammar::{
    NonterminalID, ProductionID, SymbolID, TaggedGrammar, TerminalID, TerminalSet,
};
use crate::lalr::Reduce;
use crate::lr0::{self, LR0Automaton, LR0Item, StateID};
use crate::lr1::{self, LR1Automaton, LR1Item};
use crate::types::{Map, Set};
use crate::util::display_fn;
use std::fmt;

/// Key of the ACTION table.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TerminalTransition {
    pub state: StateID,
    pub symbol: TerminalID,
}

impl fmt::Debug for TerminalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.state, self.symbol)
    }
}

/// Key of the GOTO table, and the node of the LALR relational graphs.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NonterminalTransition {
    pub state: StateID,
    pub symbol: NonterminalID,
}

impl fmt::Debug for NonterminalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.state, self.symbol)
    }
}

/// A single parse decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read the lookahead terminal and transition to the specified state.
    Shift(StateID),
    /// Reduce by the specified production rule.
    Reduce(ProductionID),
    Accept,
}

/// The contents of one ACTION cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSet {
    /// Exactly one applicable action.
    Action(Action),
    /// Multiple competing actions. At most one shift; acceptance competes as
    /// a reduction of [`ProductionID::ACCEPT`].
    Conflict {
        shift: Option<StateID>,
        reductions: Vec<ProductionID>,
    },
}

impl ActionSet {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// The member actions, conflicting or not.
    pub fn actions(&self) -> Vec<Action> {
        match self {
            Self::Action(action) => vec![*action],
            Self::Conflict { shift, reductions } => shift
                .map(Action::Shift)
                .into_iter()
                .chain(reductions.iter().map(|&p| match p {
                    ProductionID::ACCEPT => Action::Accept,
                    p => Action::Reduce(p),
                }))
                .collect(),
        }
    }
}

/// An LR item of a published state. The lookahead set is empty for tables
/// built without lookahead discrimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub production: ProductionID,
    pub index: u16,
    pub lookahead: TerminalSet,
}

impl Item {
    pub fn display<'g>(&'g self, g: &'g TaggedGrammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let production = g.production(self.production);
            write!(f, "{} -> [", g.nonterminals[&production.left])?;
            for (i, r) in production.right.iter().enumerate() {
                if i == usize::from(self.index) {
                    f.write_str(" .")?;
                }
                match r {
                    SymbolID::N(n) => write!(f, " {}", g.nonterminals[n])?,
                    SymbolID::T(t) => write!(f, " {}", g.terminals[t])?,
                }
            }
            if production.right.len() == usize::from(self.index) {
                f.write_str(" .")?;
            }
            f.write_str(" ]")?;
            if !self.lookahead.is_empty() {
                f.write_str(" {")?;
                for (i, t) in self.lookahead.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", g.terminals[&t])?;
                }
                f.write_str("}")?;
            }
            Ok(())
        })
    }
}

/// A parser state published with the table: the kernel items followed by
/// their closure.
#[derive(Debug, PartialEq, Eq)]
pub struct ParserState {
    pub items: Vec<Item>,
}

/// The computed ACTION/GOTO tables. Immutable once returned.
#[derive(Debug, PartialEq, Eq)]
pub struct ParserTable {
    pub states: Map<StateID, ParserState>,
    pub actions: Map<TerminalTransition, ActionSet>,
    pub gotos: Map<NonterminalTransition, StateID>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub conflicts: Vec<Conflict>,
    pub notes: Vec<String>,
}

impl Diagnostics {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// A conflicting ACTION cell, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    ShiftReduce {
        state: StateID,
        symbol: TerminalID,
        shift: StateID,
        reductions: Vec<ProductionID>,
    },
    ReduceReduce {
        state: StateID,
        symbol: TerminalID,
        reductions: Vec<ProductionID>,
    },
}

#[derive(Default)]
struct PendingAction {
    shift: Option<StateID>,
    accept: bool,
    reductions: Vec<ProductionID>,
}

/// Upgrade an LR(0) automaton into a parser table, restricting each
/// reduction to the lookahead set registered for it.
///
/// The LR(0), SLR(1) and LALR(1) builders all pass through here; they differ
/// only in the lookahead sets (every terminal, FOLLOW of the left-hand side,
/// and the LA sets respectively). `kernel_lookaheads` optionally annotates
/// the published items with per-kernel lookaheads, expanded through the
/// LR(1) closure.
pub(crate) fn from_lr0(
    g: &TaggedGrammar,
    lr0: &LR0Automaton,
    lookaheads: &Map<Reduce, TerminalSet>,
    kernel_lookaheads: Option<(&Map<StateID, Vec<TerminalSet>>, &FirstSets)>,
) -> ParserTable {
    let nonkernels = lr0::nonkernels(g);

    let mut states = Map::default();
    let mut actions = Map::default();
    let mut gotos = Map::default();
    let mut conflicts = Vec::new();

    for (&id, state) in &lr0.states {
        let items = match kernel_lookaheads {
            None => {
                let mut items: Vec<Item> = state
                    .kernels
                    .iter()
                    .map(|kernel| Item {
                        production: kernel.production,
                        index: kernel.index,
                        lookahead: TerminalSet::default(),
                    })
                    .collect();
                let mut closure: Set<LR0Item> = Set::default();
                for kernel in &state.kernels {
                    let production = g.production(kernel.production);
                    if let Some(SymbolID::N(n)) =
                        production.right.get::<usize>(kernel.index.into())
                    {
                        closure.extend(&nonkernels[n]);
                    }
                }
                items.extend(closure.iter().map(|item| Item {
                    production: item.production,
                    index: item.index,
                    lookahead: TerminalSet::default(),
                }));
                items
            }
            Some((kernel_lookaheads, first_sets)) => {
                let la = &kernel_lookaheads[&id];
                let mut set = Set::<LR1Item>::default();
                for (k, kernel) in state.kernels.iter().enumerate() {
                    if kernel.production == ProductionID::ACCEPT {
                        set.insert(LR1Item {
                            production: kernel.production,
                            index: kernel.index,
                            lookahead: TerminalID::EOI,
                        });
                    } else {
                        for t in la[k].iter() {
                            set.insert(LR1Item {
                                production: kernel.production,
                                index: kernel.index,
                                lookahead: t,
                            });
                        }
                    }
                }
                lr1::closure(g, first_sets, &mut set);
                group_items(&set)
            }
        };
        states.insert(id, ParserState { items });

        state_cells(
            id,
            &state.shifts,
            state.accept,
            state.reduces.iter().map(|&production| {
                let la = &lookaheads[&Reduce {
                    state: id,
                    production,
                }];
                (production, la)
            }),
            &mut actions,
            &mut conflicts,
        );

        for (&symbol, &next) in &state.gotos {
            gotos.insert(NonterminalTransition { state: id, symbol }, next);
        }
    }

    ParserTable {
        states,
        actions,
        gotos,
        diagnostics: Diagnostics {
            conflicts,
            notes: lint_notes(g),
        },
    }
}

/// Build the parser table of a canonical LR(1) automaton.
pub(crate) fn from_lr1(g: &TaggedGrammar, automaton: &LR1Automaton) -> ParserTable {
    let mut states = Map::default();
    let mut actions = Map::default();
    let mut gotos = Map::default();
    let mut conflicts = Vec::new();

    for (&id, state) in &automaton.states {
        states.insert(
            id,
            ParserState {
                items: group_items(&state.items),
            },
        );

        state_cells(
            id,
            &state.shifts,
            state.accept,
            state.reduces.iter().map(|(&p, la)| (p, la)),
            &mut actions,
            &mut conflicts,
        );

        for (&symbol, &next) in &state.gotos {
            gotos.insert(NonterminalTransition { state: id, symbol }, next);
        }
    }

    ParserTable {
        states,
        actions,
        gotos,
        diagnostics: Diagnostics {
            conflicts,
            notes: lint_notes(g),
        },
    }
}

/// Merge the items sharing a core, unioning their lookaheads.
fn group_items(items: &Set<LR1Item>) -> Vec<Item> {
    let mut grouped = Map::<(ProductionID, u16), TerminalSet>::default();
    for item in items {
        grouped
            .entry((item.production, item.index))
            .or_default()
            .insert(item.lookahead);
    }
    grouped
        .into_iter()
        .map(|((production, index), lookahead)| Item {
            production,
            index,
            lookahead,
        })
        .collect()
}

/// Fill the ACTION cells of one state and classify its conflicts.
fn state_cells<'g>(
    state: StateID,
    shifts: &Map<TerminalID, StateID>,
    accept: bool,
    reduces: impl Iterator<Item = (ProductionID, &'g TerminalSet)>,
    actions: &mut Map<TerminalTransition, ActionSet>,
    conflicts: &mut Vec<Conflict>,
) {
    let mut pending = Map::<TerminalID, PendingAction>::default();
    for (&t, &next) in shifts {
        pending.entry(t).or_default().shift = Some(next);
    }
    if accept {
        pending.entry(TerminalID::EOI).or_default().accept = true;
    }
    for (production, lookahead) in reduces {
        for t in lookahead.iter() {
            pending.entry(t).or_default().reductions.push(production);
        }
    }

    for (symbol, action) in pending {
        let cell = finalize_cell(state, symbol, action, conflicts);
        actions.insert(TerminalTransition { state, symbol }, cell);
    }
}

fn finalize_cell(
    state: StateID,
    symbol: TerminalID,
    action: PendingAction,
    conflicts: &mut Vec<Conflict>,
) -> ActionSet {
    let PendingAction {
        shift,
        accept,
        mut reductions,
    } = action;
    reductions.sort_unstable();
    reductions.dedup();
    if accept {
        reductions.insert(0, ProductionID::ACCEPT);
    }

    match (shift, &reductions[..]) {
        (Some(next), []) => ActionSet::Action(Action::Shift(next)),
        (None, [ProductionID::ACCEPT]) => ActionSet::Action(Action::Accept),
        (None, [production]) => ActionSet::Action(Action::Reduce(*production)),
        (shift, _) => {
            conflicts.push(match shift {
                Some(next) => Conflict::ShiftReduce {
                    state,
                    symbol,
                    shift: next,
                    reductions: reductions.clone(),
                },
                None => Conflict::ReduceReduce {
                    state,
                    symbol,
                    reductions: reductions.clone(),
                },
            });
            ActionSet::Conflict { shift, reductions }
        }
    }
}

/// Non-fatal lints reported alongside the table.
fn lint_notes(g: &TaggedGrammar) -> Vec<String> {
    let mut notes = Vec::new();

    let mut used = TerminalSet::default();
    for p in g.productions.values() {
        for symbol in &p.right {
            if let SymbolID::T(t) = symbol {
                used.insert(*t);
            }
        }
    }
    for (&t, name) in &g.terminals {
        if t != TerminalID::EOI && !used.contains(t) {
            notes.push(format!("terminal `{}` is not used by any production", name));
        }
    }

    let mut reachable = Set::default();
    reachable.insert(NonterminalID::START);
    reachable.insert(g.start_symbol);
    let mut changed = true;
    while changed {
        changed = false;
        for p in g.productions.values() {
            if !reachable.contains(&p.left) {
                continue;
            }
            for symbol in &p.right {
                if let SymbolID::N(n) = symbol {
                    changed |= reachable.insert(*n);
                }
            }
        }
    }
    for (&n, name) in &g.nonterminals {
        if !reachable.contains(&n) {
            notes.push(format!(
                "nonterminal `{}` is unreachable from the start symbol",
                name
            ));
        }
    }

    notes
}

impl ParserTable {
    pub fn display<'g>(&'g self, g: &'g TaggedGrammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (id, state)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }

                writeln!(f, "#### {:?}", id)?;
                writeln!(f, "## items")?;
                for item in &state.items {
                    writeln!(f, "- {}", item.display(g))?;
                }

                writeln!(f, "## actions")?;
                for (key, cell) in self.actions.iter().filter(|(key, _)| key.state == *id) {
                    let token = &g.terminals[&key.symbol];
                    match cell {
                        ActionSet::Action(Action::Shift(next)) => {
                            writeln!(f, "- {} => shift({:?})", token, next)?;
                        }
                        ActionSet::Action(Action::Reduce(p)) => {
                            writeln!(f, "- {} => reduce({})", token, g.production(*p).display(g))?;
                        }
                        ActionSet::Action(Action::Accept) => {
                            writeln!(f, "- {} => accept", token)?;
                        }
                        ActionSet::Conflict { shift, reductions } => {
                            writeln!(f, "- {} => conflict:", token)?;
                            if let Some(next) = shift {
                                writeln!(f, "  - shift({:?})", next)?;
                            }
                            for p in reductions {
                                writeln!(f, "  - reduce({})", g.production(*p).display(g))?;
                            }
                        }
                    }
                }

                if self.gotos.keys().any(|key| key.state == *id) {
                    writeln!(f, "## gotos")?;
                    for (key, next) in self.gotos.iter().filter(|(key, _)| key.state == *id) {
                        writeln!(f, "- {} => goto({:?})", g.nonterminals[&key.symbol], next)?;
                    }
                }
            }
            Ok(())
        })
    }
}
