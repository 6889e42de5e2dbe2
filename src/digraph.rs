//! The digraph procedure of DeRemer and Pennello.
//!
//! Solves `F(x) = F'(x) ∪ ⋃{ F(y) | x R y }` for a relation `R` with a single
//! Tarjan-style depth-first traversal: members of a strongly connected
//! component all receive the component-wide union, and reachable components
//! contribute transitively.

use crate::types::Map;
use indexmap::map::Slice;
use std::{cmp, hash::Hash};

pub trait Set {
    fn union_with(&mut self, other: &Self);
}

impl<T> Set for crate::types::Set<T>
where
    T: Clone + Eq + Hash,
{
    fn union_with(&mut self, other: &Self) {
        self.extend(other.iter().cloned())
    }
}

/// Run the procedure in place: on entry `result` maps each node to its base
/// set `F'(x)`, on exit to the least solution `F(x)`.
///
/// Returns the nontrivial strongly connected components of `R` restricted to
/// the keys of `result` (components of two or more nodes, or single nodes
/// related to themselves). Callers use them for the non-LR(k) cycle test.
pub fn digraph<K, T>(result: &mut Map<K, T>, relation: impl Fn(&K, &K) -> bool) -> Vec<Vec<K>>
where
    K: Clone + Eq + Hash,
    T: Set,
{
    let keys: Vec<_> = result.keys().cloned().collect();
    let n = keys.len();
    let mut traversal = Digraph {
        result: result.as_mut_slice(),
        relation,
        keys: &keys[..],
        n: vec![0usize; n],
        self_loop: vec![false; n],
        stack: vec![],
        components: vec![],
    };
    traversal.run();
    traversal.components
}

struct Digraph<'a, K, T, F> {
    result: &'a mut Slice<K, T>,
    relation: F,
    keys: &'a [K],
    n: Vec<usize>,
    self_loop: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<K>>,
}

impl<K, T, F> Digraph<'_, K, T, F>
where
    K: Clone + Eq + Hash,
    T: Set,
    F: Fn(&K, &K) -> bool,
{
    fn run(&mut self) {
        for x in 0..self.keys.len() {
            if self.n[x] == 0 {
                self.traverse(x);
            }
        }
    }

    fn traverse(&mut self, x: usize) {
        self.stack.push(x);
        let d = self.stack.len();
        self.n[x] = d;

        let x_key = &self.keys[x];
        for (y, y_key) in self.keys.iter().enumerate() {
            if !(self.relation)(x_key, y_key) {
                continue;
            }
            if x == y {
                self.self_loop[x] = true;
                continue;
            }

            if self.n[y] == 0 {
                self.traverse(y);
            }
            self.n[x] = cmp::min(self.n[x], self.n[y]);

            // F(x) <- F(x) \cup F(y)
            let (slot, added) = get_two_mut(&mut self.result, x, y);
            slot.union_with(added);
        }

        if self.n[x] != d {
            return;
        }

        let mut component = vec![];
        while let Some(s) = self.stack.pop() {
            self.n[s] = usize::MAX;
            if s == x {
                break;
            }
            // F(s) <- F(x)
            let (slot, added) = get_two_mut(&mut self.result, s, x);
            slot.union_with(added);
            component.push(self.keys[s].clone());
        }
        if !component.is_empty() || self.self_loop[x] {
            component.push(self.keys[x].clone());
            self.components.push(component);
        }
    }
}

fn get_two_mut<K, V>(slice: &mut Slice<K, V>, x: usize, y: usize) -> (&mut V, &mut V) {
    assert!(
        x != y && cmp::max(x, y) < slice.len(),
        "index condition not satisfied"
    );
    let i = (x + y) / 2 + 1;
    let (a, b) = slice.split_at_mut(i);
    if x < y {
        (&mut a[x], &mut b[y - i])
    } else {
        (&mut b[x - i], &mut a[y])
    }
}
