//! LALR(1) look-ahead sets computation.
//!
//! The algorithm is DeRemer and Pennello's method\[1\]: the `reads` and
//! `includes` relations over nonterminal transitions are solved with the
//! digraph procedure, and the resulting Follow sets are distributed to the
//! reductions through the `lookback` relation.
//!
//! \[1\]: DeRemer and Pennello, Efficient Computation of LALR(1) Look-Ahead Sets
//!       <https://dl.acm.org/doi/10.1145/69622.357187>

use crate::digraph;
use crate::grammar::{ProductionID, SymbolID, TaggedGrammar, TerminalID, TerminalSet};
use crate::lr0::{LR0Automaton, StateID};
use crate::table::NonterminalTransition;
use crate::types::{Map, Set};
use crate::BuildError;
use std::fmt;

/// A reduction position, the key of the computed lookahead sets.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Reduce {
    pub state: StateID,
    pub production: ProductionID,
}

impl fmt::Debug for Reduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.state, self.production)
    }
}

#[derive(Debug)]
pub struct LalrData {
    /// `LA(q, A -> ω)` for every reduction of the LR(0) automaton.
    pub lookaheads: Map<Reduce, TerminalSet>,
    /// Lookahead sets of each state's kernel items, indexed like
    /// `LR0State::kernels`.
    pub item_lookaheads: Map<StateID, Vec<TerminalSet>>,
    /// `Follow(p, A)` per nonterminal transition.
    pub follows: Map<NonterminalTransition, TerminalSet>,
    /// `Read(p, A)` per nonterminal transition.
    pub reads: Map<NonterminalTransition, TerminalSet>,
    /// `DirectRead(p, A)` per nonterminal transition.
    pub direct_reads: Map<NonterminalTransition, TerminalSet>,
}

/// Compute the look-ahead sets corresponding to the reductions in the
/// provided LR(0) automaton.
///
/// Fails with [`BuildError::NotLRk`] when the `includes` relation has a cycle
/// whose Read sets are not all empty; such a grammar is not LR(k) for any k.
#[tracing::instrument(skip_all)]
pub fn lalr(g: &TaggedGrammar, lr0: &LR0Automaton) -> Result<LalrData, BuildError> {
    // Step 0: extract goto transitions and their direct-read sets.
    //
    //   DirectRead(p,A) := { t \in T | \exists r s.t. p --(A)--> r --(t)--> ... }
    //
    // The end-of-input marker is readable from the accept state even though
    // it is never shifted into a successor.
    let mut gotos = Map::default();
    let mut direct_reads = Map::default();
    for (&from, state) in &lr0.states {
        for (&symbol, &to) in &state.gotos {
            let key = NonterminalTransition {
                state: from,
                symbol,
            };
            gotos.insert(key, to);
            let target = &lr0.states[&to];
            let mut dr: TerminalSet = target.shifts.keys().copied().collect();
            if target.accept {
                dr.insert(TerminalID::EOI);
            }
            direct_reads.insert(key, dr);
        }
    }

    // Step 0.5: the relations.
    //
    // - (p,A) `reads` (r,C) <==> p --(A)--> r --(C)--> && C =>* ε
    // - (p,A) `includes` (p',B) <==> B -> βAγ, γ =>* ε, p' -(β)-> p
    // - (q, A->ω) `lookback` (p,A) <==> p --(ω)--> q
    let reads = calc_reads(g, lr0, &gotos);
    let includes = calc_includes(g, lr0, &gotos);
    let lookbacks = calc_lookbacks(g, lr0);
    tracing::trace!(
        "relation sizes: reads = {}, includes = {}, lookbacks = {}",
        reads.values().map(Set::len).sum::<usize>(),
        includes.values().map(Set::len).sum::<usize>(),
        lookbacks.values().map(Set::len).sum::<usize>(),
    );

    // Step 1: Read(p,A) = DirectRead(p,A) \cup \bigcup { Read(r,C) | (p,A) `reads` (r,C) }
    let mut read_sets = direct_reads.clone();
    digraph::digraph(&mut read_sets, |a, b| {
        reads.get(a).map_or(false, |r| r.contains(b))
    });

    // Step 2: Follow(p,A) = Read(p,A) \cup \bigcup { Follow(p',B) | (p,A) `includes` (p',B) }
    //
    // A nontrivial cycle of `includes` whose Read sets are not all empty
    // pumps those terminals through every lookahead on the cycle; no finite
    // lookahead resolves such a grammar.
    let mut follows = read_sets.clone();
    let components = digraph::digraph(&mut follows, |a, b| {
        includes.get(a).map_or(false, |i| i.contains(b))
    });
    for component in components {
        if let Some(&transition) = component.iter().find(|t| !read_sets[*t].is_empty()) {
            return Err(BuildError::NotLRk(transition));
        }
    }

    // Step 3: LA(q, A->ω) = \bigcup { Follow(p,A) | (q, A->ω) `lookback` (p,A) }
    let mut lookaheads = Map::<Reduce, TerminalSet>::default();
    for (&state, lr0_state) in &lr0.states {
        for &production in &lr0_state.reduces {
            let reduce = Reduce { state, production };
            let la = lookaheads.entry(reduce).or_default();
            for transition in lookbacks.get(&reduce).into_iter().flatten() {
                if let Some(follow) = follows.get(transition) {
                    la.union_with(follow);
                }
            }
        }
    }

    // Step 4: lookahead sets for the LR(0) kernel items.
    let item_lookaheads = item_lookaheads(g, lr0, &follows);

    Ok(LalrData {
        lookaheads,
        item_lookaheads,
        follows,
        reads: read_sets,
        direct_reads,
    })
}

fn calc_reads(
    g: &TaggedGrammar,
    lr0: &LR0Automaton,
    gotos: &Map<NonterminalTransition, StateID>,
) -> Map<NonterminalTransition, Set<NonterminalTransition>> {
    let mut reads = Map::<NonterminalTransition, Set<NonterminalTransition>>::default();

    for (&transition, &target) in gotos {
        reads.entry(transition).or_default().extend(
            lr0.states[&target]
                .gotos
                .keys()
                .filter(|&c| g.nullables.contains(c))
                .map(|&symbol| NonterminalTransition {
                    state: target,
                    symbol,
                }),
        );
    }

    reads
}

fn calc_includes(
    g: &TaggedGrammar,
    lr0: &LR0Automaton,
    gotos: &Map<NonterminalTransition, StateID>,
) -> Map<NonterminalTransition, Set<NonterminalTransition>> {
    let mut includes = Map::<NonterminalTransition, Set<NonterminalTransition>>::default();

    for a_key in gotos.keys() {
        for b_key in gotos.keys() {
            for p in g.productions.values() {
                // B -> β A γ and γ =>* ε, for every position of A
                if p.left != b_key.symbol {
                    continue;
                }
                'positions: for (i, symbol) in p.right.iter().enumerate() {
                    if !matches!(symbol, SymbolID::N(n) if *n == a_key.symbol) {
                        continue;
                    }
                    if !g.all_nullable(&p.right[i + 1..]) {
                        continue;
                    }

                    // p' --(β)--> must end at p
                    let beta = &p.right[..i];
                    let mut current = b_key.state;
                    for sym in beta {
                        let next = match sym {
                            SymbolID::T(t) => lr0.states[&current].shifts.get(t),
                            SymbolID::N(n) => lr0.states[&current].gotos.get(n),
                        };
                        match next {
                            Some(&next) => current = next,
                            None => continue 'positions,
                        }
                    }
                    if current == a_key.state {
                        includes.entry(*a_key).or_default().insert(*b_key);
                    }
                }
            }
        }
    }

    includes
}

fn calc_lookbacks(g: &TaggedGrammar, lr0: &LR0Automaton) -> Map<Reduce, Set<NonterminalTransition>> {
    let mut lookbacks = Map::<Reduce, Set<NonterminalTransition>>::default();

    for &from in lr0.states.keys() {
        for (&id, p) in &g.productions {
            if id == ProductionID::ACCEPT {
                continue;
            }
            let mut current = from;
            let mut right = &p.right[..];
            while let Some(sym) = right.first() {
                let next = match sym {
                    SymbolID::T(t) => lr0.states[&current].shifts.get(t),
                    SymbolID::N(n) => lr0.states[&current].gotos.get(n),
                };
                match next {
                    Some(&next) => {
                        current = next;
                        right = &right[1..];
                    }
                    None => break,
                }
            }
            if right.is_empty() {
                let reduce = Reduce {
                    state: current,
                    production: id,
                };
                lookbacks.entry(reduce).or_default().insert(NonterminalTransition {
                    state: from,
                    symbol: p.left,
                });
            }
        }
    }

    lookbacks
}

/// Propagate Follow sets onto the kernel items of each state.
///
/// An item `[X -> A . β]` takes the Follow of the transitions on `X` out of
/// the state's predecessors; a deeper item `[X -> ... A . β]` inherits from
/// the matching kernel of every predecessor. Iterated to a fixed point since
/// the automaton may be cyclic.
fn item_lookaheads(
    g: &TaggedGrammar,
    lr0: &LR0Automaton,
    follows: &Map<NonterminalTransition, TerminalSet>,
) -> Map<StateID, Vec<TerminalSet>> {
    let mut lookaheads: Map<StateID, Vec<TerminalSet>> = lr0
        .states
        .iter()
        .map(|(&id, state)| (id, vec![TerminalSet::default(); state.kernels.len()]))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (&id, state) in &lr0.states {
            for (k, kernel) in state.kernels.iter().enumerate() {
                let production = g.production(kernel.production);
                let mut added = TerminalSet::default();
                match kernel.index {
                    // The start kernel `#Start -> . S #EOI` has no context.
                    0 => continue,
                    1 => {
                        for &from in state.predecessors.keys() {
                            let transition = NonterminalTransition {
                                state: from,
                                symbol: production.left,
                            };
                            if let Some(follow) = follows.get(&transition) {
                                added.union_with(follow);
                            }
                        }
                    }
                    _ => {
                        for &from in state.predecessors.keys() {
                            let from_state = &lr0.states[&from];
                            for (j, from_kernel) in from_state.kernels.iter().enumerate() {
                                if from_kernel.production == kernel.production
                                    && from_kernel.index == kernel.index - 1
                                {
                                    added.union_with(&lookaheads[&from][j]);
                                }
                            }
                        }
                    }
                }

                let slot = &mut lookaheads[&id][k];
                let before = slot.len();
                slot.union_with(&added);
                changed |= slot.len() != before;
            }
        }
    }

    lookaheads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, Production};
    use crate::lr0::lr0;

    fn production(lhs: &str, rhs: &[&str]) -> Production {
        Production {
            lhs: lhs.to_owned(),
            rhs: rhs.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn terminal(g: &TaggedGrammar, name: &str) -> TerminalID {
        g.terminals
            .iter()
            .find_map(|(id, n)| (n == name).then_some(*id))
            .unwrap()
    }

    #[test]
    fn read_sets_traverse_nullable_gotos() {
        // S -> A C a ; C -> ε | c ; A -> x
        let g = TaggedGrammar::build(&Grammar {
            terminals: vec!["a".into(), "c".into(), "x".into()],
            nonterminals: vec!["S".into(), "C".into(), "A".into()],
            start: "S".into(),
            productions: vec![
                production("S", &["A", "C", "a"]),
                production("C", &[]),
                production("C", &["c"]),
                production("A", &["x"]),
            ],
        })
        .unwrap();
        let automaton = lr0(&g);
        let data = lalr(&g, &automaton).unwrap();

        let a = g
            .nonterminals
            .iter()
            .find_map(|(id, n)| (n == "A").then_some(*id))
            .unwrap();
        let on_a = NonterminalTransition {
            state: StateID::from_raw(0),
            symbol: a,
        };

        // DirectRead(0,A) sees only `c`; Read(0,A) also reaches `a` through
        // the nullable goto on C.
        assert_eq!(
            data.direct_reads[&on_a],
            TerminalSet::from_iter([terminal(&g, "c")])
        );
        assert_eq!(
            data.reads[&on_a],
            TerminalSet::from_iter([terminal(&g, "a"), terminal(&g, "c")])
        );
    }
}
