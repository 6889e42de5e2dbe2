//! End-to-end table construction scenarios.
//!
//! The concrete grammars are the classic textbook examples: a parenthesized
//! list grammar, a right-recursive sum grammar whose LR(0) table has a
//! shift/reduce conflict, and an assignment grammar that is LR(1) and
//! LALR(1) but not SLR(1).

use lrgen::grammar::{
    Grammar, NonterminalID, Production, ProductionID, TaggedGrammar, TerminalID, TerminalSet,
};
use lrgen::lr0::StateID;
use lrgen::table::{NonterminalTransition, TerminalTransition};
use lrgen::{
    build_lalr1, build_lr0, build_lr1, build_slr1, Action, ActionSet, BuildError, Conflict,
    ParserTable,
};

fn production(lhs: &str, rhs: &[&str]) -> Production {
    Production {
        lhs: lhs.to_owned(),
        rhs: rhs.iter().map(|s| (*s).to_owned()).collect(),
    }
}

/// S -> ( L ) | x ; L -> S | L , S
fn list_grammar() -> Grammar {
    Grammar {
        terminals: vec!["(".into(), ")".into(), "x".into(), ",".into()],
        nonterminals: vec!["S".into(), "L".into()],
        start: "S".into(),
        productions: vec![
            production("S", &["(", "L", ")"]),
            production("S", &["x"]),
            production("L", &["S"]),
            production("L", &["L", ",", "S"]),
        ],
    }
}

/// E -> T + E | T ; T -> x
fn sum_grammar() -> Grammar {
    Grammar {
        terminals: vec!["+".into(), "x".into()],
        nonterminals: vec!["E".into(), "T".into()],
        start: "E".into(),
        productions: vec![
            production("E", &["T", "+", "E"]),
            production("E", &["T"]),
            production("T", &["x"]),
        ],
    }
}

/// S -> V = E | E ; E -> V ; V -> x | * E
fn assignment_grammar() -> Grammar {
    Grammar {
        terminals: vec!["x".into(), "*".into(), "=".into()],
        nonterminals: vec!["S".into(), "V".into(), "E".into()],
        start: "S".into(),
        productions: vec![
            production("S", &["V", "=", "E"]),
            production("S", &["E"]),
            production("E", &["V"]),
            production("V", &["x"]),
            production("V", &["*", "E"]),
        ],
    }
}

fn terminal(g: &TaggedGrammar, name: &str) -> TerminalID {
    g.terminals
        .iter()
        .find_map(|(id, n)| (n == name).then_some(*id))
        .unwrap()
}

fn nonterminal(g: &TaggedGrammar, name: &str) -> NonterminalID {
    g.nonterminals
        .iter()
        .find_map(|(id, n)| (n == name).then_some(*id))
        .unwrap()
}

fn action(table: &ParserTable, state: StateID, symbol: TerminalID) -> &ActionSet {
    &table.actions[&TerminalTransition { state, symbol }]
}

/// The state holding the given kernel item. Panics unless exactly one state
/// holds it.
fn state_with_kernel_item(table: &ParserTable, production: ProductionID, index: u16) -> StateID {
    let matches: Vec<StateID> = table
        .states
        .iter()
        .filter(|(_, state)| {
            state
                .items
                .iter()
                .any(|item| item.production == production && item.index == index)
        })
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(matches.len(), 1, "kernel item is not unique to one state");
    matches[0]
}

fn accept_cells(table: &ParserTable) -> Vec<TerminalTransition> {
    table
        .actions
        .iter()
        .filter(|(_, cell)| matches!(cell, ActionSet::Action(Action::Accept)))
        .map(|(key, _)| *key)
        .collect()
}

#[test]
fn lr0_list_grammar_layout() {
    let grammar = list_grammar();
    let g = TaggedGrammar::build(&grammar).unwrap();
    let table = build_lr0(&grammar).unwrap();

    assert_eq!(table.states.len(), 9);
    assert!(table.diagnostics.conflicts.is_empty());

    let start_state = StateID::from_raw(0);
    assert!(matches!(
        action(&table, start_state, terminal(&g, "(")),
        ActionSet::Action(Action::Shift(_))
    ));
    assert!(matches!(
        action(&table, start_state, terminal(&g, "x")),
        ActionSet::Action(Action::Shift(_))
    ));

    // The accept cell sits at (goto(0, S), #EOI) and nowhere else.
    let after_start = table.gotos[&NonterminalTransition {
        state: start_state,
        symbol: nonterminal(&g, "S"),
    }];
    assert_eq!(
        accept_cells(&table),
        [TerminalTransition {
            state: after_start,
            symbol: TerminalID::EOI,
        }]
    );

    // S -> x reduces on every terminal, the end marker included.
    let s_to_x = ProductionID::from_raw(2);
    let after_x = state_with_kernel_item(&table, s_to_x, 1);
    for &t in g.terminals.keys() {
        assert_eq!(
            *action(&table, after_x, t),
            ActionSet::Action(Action::Reduce(s_to_x))
        );
    }

    // S -> ( . L ) has gotos on both L and S.
    let after_lparen = state_with_kernel_item(&table, ProductionID::from_raw(1), 1);
    for name in ["L", "S"] {
        assert!(table.gotos.contains_key(&NonterminalTransition {
            state: after_lparen,
            symbol: nonterminal(&g, name),
        }));
    }

    // S -> ( L . ) ; L -> L . , S shifts on both `)` and `,`.
    let list_open = state_with_kernel_item(&table, ProductionID::from_raw(1), 2);
    for name in [")", ","] {
        assert!(matches!(
            action(&table, list_open, terminal(&g, name)),
            ActionSet::Action(Action::Shift(_))
        ));
    }
}

#[test]
fn lr0_conflict_resolved_by_slr() {
    let grammar = sum_grammar();
    let g = TaggedGrammar::build(&grammar).unwrap();
    let plus = terminal(&g, "+");
    let e_to_t = ProductionID::from_raw(2);

    let lr0_table = build_lr0(&grammar).unwrap();
    assert_eq!(lr0_table.states.len(), 6);

    // E -> T . + E ; E -> T . is a shift/reduce conflict on `+` for LR(0).
    let after_t = state_with_kernel_item(&lr0_table, e_to_t, 1);
    let cell = action(&lr0_table, after_t, plus);
    assert!(cell.is_conflict());
    match cell {
        ActionSet::Conflict { shift, reductions } => {
            assert!(shift.is_some());
            assert_eq!(*reductions, [e_to_t]);
        }
        other => panic!("expected a conflict cell, got {:?}", other),
    }
    assert_eq!(lr0_table.diagnostics.conflicts.len(), 1);
    assert!(matches!(
        lr0_table.diagnostics.conflicts[0],
        Conflict::ShiftReduce { state, symbol, .. } if state == after_t && symbol == plus
    ));

    // Plain reductions elsewhere in the row.
    assert_eq!(
        *action(&lr0_table, after_t, TerminalID::EOI),
        ActionSet::Action(Action::Reduce(e_to_t))
    );

    // SLR(1) keeps the states and resolves the cell: shift on `+`, reduce
    // only at the end of input.
    let slr_table = build_slr1(&grammar).unwrap();
    assert_eq!(slr_table.states.len(), 6);
    assert!(slr_table.diagnostics.conflicts.is_empty());
    assert!(matches!(
        action(&slr_table, after_t, plus),
        ActionSet::Action(Action::Shift(_))
    ));
    assert_eq!(
        *action(&slr_table, after_t, TerminalID::EOI),
        ActionSet::Action(Action::Reduce(e_to_t))
    );
    assert!(!slr_table.actions.contains_key(&TerminalTransition {
        state: after_t,
        symbol: terminal(&g, "x"),
    }));
}

#[test]
fn assignment_grammar_state_counts() {
    let grammar = assignment_grammar();

    let lr0_table = build_lr0(&grammar).unwrap();
    assert_eq!(lr0_table.states.len(), 10);

    let lr1_table = build_lr1(&grammar).unwrap();
    assert_eq!(lr1_table.states.len(), 14);
    assert!(!lr1_table.diagnostics.has_conflicts());

    // LALR(1) keeps the LR(0) states and still resolves every cell.
    let lalr_table = build_lalr1(&grammar).unwrap();
    assert_eq!(lalr_table.states.len(), 10);
    assert!(!lalr_table.diagnostics.has_conflicts());
}

#[test]
fn assignment_grammar_is_not_slr() {
    let grammar = assignment_grammar();
    let g = TaggedGrammar::build(&grammar).unwrap();
    let eq = terminal(&g, "=");

    let slr_table = build_slr1(&grammar).unwrap();
    assert!(slr_table
        .diagnostics
        .conflicts
        .iter()
        .any(|c| matches!(c, Conflict::ShiftReduce { symbol, .. } if *symbol == eq)));
}

#[test]
fn lalr_lookaheads_distinguish_assignment_context() {
    let grammar = assignment_grammar();
    let g = TaggedGrammar::build(&grammar).unwrap();
    let eq = terminal(&g, "=");
    let s_to_assign = ProductionID::from_raw(1);
    let e_to_v = ProductionID::from_raw(3);
    let v_to_x = ProductionID::from_raw(4);

    let table = build_lalr1(&grammar).unwrap();

    // S -> V . = E ; E -> V . shifts on `=` and reduces only at end of input.
    let after_v = state_with_kernel_item(&table, s_to_assign, 1);
    assert!(matches!(
        action(&table, after_v, eq),
        ActionSet::Action(Action::Shift(_))
    ));
    assert_eq!(
        *action(&table, after_v, TerminalID::EOI),
        ActionSet::Action(Action::Reduce(e_to_v))
    );

    // The published kernel item carries the computed lookahead set.
    let item = table.states[&after_v]
        .items
        .iter()
        .find(|item| item.production == e_to_v && item.index == 1)
        .unwrap();
    assert_eq!(item.lookahead, TerminalSet::from_iter([TerminalID::EOI]));

    // The merged V -> x . state reduces in both contexts.
    let after_x = state_with_kernel_item(&table, v_to_x, 1);
    for t in [eq, TerminalID::EOI] {
        assert_eq!(
            *action(&table, after_x, t),
            ActionSet::Action(Action::Reduce(v_to_x))
        );
    }
}

#[test]
fn lalr_agrees_with_lr1_when_both_are_conflict_free() {
    let grammar = assignment_grammar();
    let lr1_table = build_lr1(&grammar).unwrap();
    let lalr_table = build_lalr1(&grammar).unwrap();

    // LALR states are LR(1) states merged by their item cores; related
    // states must make the same decision on every terminal.
    let cores = |state: &lrgen::table::ParserState| {
        let mut cores: Vec<(ProductionID, u16)> = state
            .items
            .iter()
            .map(|item| (item.production, item.index))
            .collect();
        cores.sort_unstable();
        cores
    };
    let lalr_by_core: Vec<(Vec<(ProductionID, u16)>, StateID)> = lalr_table
        .states
        .iter()
        .map(|(id, state)| (cores(state), *id))
        .collect();
    let to_lalr = |state: StateID| -> StateID {
        let core = cores(&lr1_table.states[&state]);
        lalr_by_core
            .iter()
            .find_map(|(c, id)| (*c == core).then_some(*id))
            .unwrap()
    };

    for (key, cell) in &lr1_table.actions {
        let merged = &lalr_table.actions[&TerminalTransition {
            state: to_lalr(key.state),
            symbol: key.symbol,
        }];
        match (cell, merged) {
            (ActionSet::Action(Action::Shift(a)), ActionSet::Action(Action::Shift(b))) => {
                assert_eq!(to_lalr(*a), *b);
            }
            (cell, merged) => assert_eq!(cell, merged),
        }
    }
}

#[test]
fn reduce_reduce_conflict_is_reported() {
    // S -> A | B ; A -> x ; B -> x
    let grammar = Grammar {
        terminals: vec!["x".into()],
        nonterminals: vec!["S".into(), "A".into(), "B".into()],
        start: "S".into(),
        productions: vec![
            production("S", &["A"]),
            production("S", &["B"]),
            production("A", &["x"]),
            production("B", &["x"]),
        ],
    };
    let a_to_x = ProductionID::from_raw(3);
    let b_to_x = ProductionID::from_raw(4);

    let table = build_slr1(&grammar).unwrap();
    let after_x = state_with_kernel_item(&table, a_to_x, 1);

    assert_eq!(
        *action(&table, after_x, TerminalID::EOI),
        ActionSet::Conflict {
            shift: None,
            reductions: vec![a_to_x, b_to_x],
        }
    );
    assert_eq!(
        table.diagnostics.conflicts,
        [Conflict::ReduceReduce {
            state: after_x,
            symbol: TerminalID::EOI,
            reductions: vec![a_to_x, b_to_x],
        }]
    );

    let lalr_table = build_lalr1(&grammar).unwrap();
    assert_eq!(lalr_table.diagnostics.conflicts.len(), 1);
}

#[test]
fn cyclic_grammar_is_rejected_by_lalr() {
    // S -> S | x derives itself; no finite lookahead decides the reduction.
    let grammar = Grammar {
        terminals: vec!["x".into()],
        nonterminals: vec!["S".into()],
        start: "S".into(),
        productions: vec![production("S", &["S"]), production("S", &["x"])],
    };
    let g = TaggedGrammar::build(&grammar).unwrap();

    let err = build_lalr1(&grammar).unwrap_err();
    match err {
        BuildError::NotLRk(transition) => {
            assert_eq!(transition.state, StateID::from_raw(0));
            assert_eq!(transition.symbol, nonterminal(&g, "S"));
        }
        other => panic!("expected NotLRk, got {:?}", other),
    }

    // SLR still produces a table; the accept cell degenerates into a
    // conflict with the self reduction.
    let table = build_slr1(&grammar).unwrap();
    let accept_state = table.gotos[&NonterminalTransition {
        state: StateID::from_raw(0),
        symbol: nonterminal(&g, "S"),
    }];
    assert_eq!(
        *action(&table, accept_state, TerminalID::EOI),
        ActionSet::Conflict {
            shift: None,
            reductions: vec![ProductionID::ACCEPT, ProductionID::from_raw(1)],
        }
    );
}

#[test]
fn builds_are_deterministic() {
    let grammar = assignment_grammar();
    assert_eq!(build_lr0(&grammar).unwrap(), build_lr0(&grammar).unwrap());
    assert_eq!(build_slr1(&grammar).unwrap(), build_slr1(&grammar).unwrap());
    assert_eq!(build_lr1(&grammar).unwrap(), build_lr1(&grammar).unwrap());
    assert_eq!(
        build_lalr1(&grammar).unwrap(),
        build_lalr1(&grammar).unwrap()
    );
}

#[test]
fn every_table_has_exactly_one_accept_cell() {
    for grammar in [list_grammar(), sum_grammar(), assignment_grammar()] {
        let g = TaggedGrammar::build(&grammar).unwrap();
        let start = nonterminal(&g, grammar.start.as_str());
        let tables = [
            build_lr0(&grammar).unwrap(),
            build_slr1(&grammar).unwrap(),
            build_lr1(&grammar).unwrap(),
            build_lalr1(&grammar).unwrap(),
        ];
        for table in &tables {
            let after_start = table.gotos[&NonterminalTransition {
                state: StateID::from_raw(0),
                symbol: start,
            }];
            assert_eq!(
                accept_cells(table),
                [TerminalTransition {
                    state: after_start,
                    symbol: TerminalID::EOI,
                }]
            );
        }
    }
}

#[test]
fn every_item_can_make_progress() {
    for grammar in [list_grammar(), sum_grammar(), assignment_grammar()] {
        let g = TaggedGrammar::build(&grammar).unwrap();
        let tables = [
            build_lr0(&grammar).unwrap(),
            build_slr1(&grammar).unwrap(),
            build_lr1(&grammar).unwrap(),
            build_lalr1(&grammar).unwrap(),
        ];
        for table in &tables {
            for (&state, parser_state) in &table.states {
                for item in &parser_state.items {
                    let p = g.production(item.production);
                    match p.right.get(usize::from(item.index)) {
                        Some(lrgen::grammar::SymbolID::T(t)) => {
                            assert!(table
                                .actions
                                .contains_key(&TerminalTransition { state, symbol: *t }));
                        }
                        Some(lrgen::grammar::SymbolID::N(n)) => {
                            assert!(table
                                .gotos
                                .contains_key(&NonterminalTransition { state, symbol: *n }));
                        }
                        // Completed items are themselves the progress.
                        None => {}
                    }
                }
            }
        }
    }
}

#[test]
fn slr_only_removes_reductions_from_lr0() {
    for grammar in [list_grammar(), sum_grammar(), assignment_grammar()] {
        let lr0_table = build_lr0(&grammar).unwrap();
        let slr_table = build_slr1(&grammar).unwrap();
        assert_eq!(slr_table.states.len(), lr0_table.states.len());
        assert_eq!(slr_table.gotos, lr0_table.gotos);

        for (key, cell) in &slr_table.actions {
            let lr0_actions = lr0_table.actions[key].actions();
            for action in cell.actions() {
                assert!(
                    lr0_actions.contains(&action),
                    "SLR invented {:?} at {:?}",
                    action,
                    key
                );
            }
        }
    }
}

#[test]
fn follow_contains_read_contains_direct_read() {
    for grammar in [list_grammar(), sum_grammar(), assignment_grammar()] {
        let g = TaggedGrammar::build(&grammar).unwrap();
        let automaton = lrgen::lr0::lr0(&g);
        let data = lrgen::lalr::lalr(&g, &automaton).unwrap();

        for (transition, follow) in &data.follows {
            assert!(follow.is_superset(&data.reads[transition]));
            assert!(data.reads[transition].is_superset(&data.direct_reads[transition]));
        }
    }
}

#[test]
fn unused_symbols_are_noted() {
    let grammar = Grammar {
        terminals: vec!["x".into(), "z".into()],
        nonterminals: vec!["S".into(), "U".into()],
        start: "S".into(),
        productions: vec![production("S", &["x"]), production("U", &["x"])],
    };
    let table = build_lr0(&grammar).unwrap();
    assert_eq!(table.diagnostics.notes.len(), 2);
    assert!(table.diagnostics.notes[0].contains("`z`"));
    assert!(table.diagnostics.notes[1].contains("`U`"));
}

#[test]
fn tables_render_with_user_names() {
    let grammar = sum_grammar();
    let g = TaggedGrammar::build(&grammar).unwrap();

    let rendered = build_lr0(&grammar).unwrap().display(&g).to_string();
    assert!(rendered.contains("#EOI => accept"));
    assert!(rendered.contains("conflict"));
    assert!(rendered.contains("E => goto"));

    let rendered = build_lalr1(&grammar).unwrap().display(&g).to_string();
    assert!(rendered.contains("reduce(E -> T)"));
    assert!(!rendered.contains("conflict"));
}
