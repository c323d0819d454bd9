use std::collections::BTreeMap;

use super::{Zid, ZidSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digraph {
    edges: BTreeMap<Zid, ZidSet>,
}

impl Digraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn add_vertex(&mut self, zid: Zid) {
        self.edges.entry(zid).or_default();
    }

    pub fn has_vertex(&self, zid: Zid) -> bool {
        self.edges.contains_key(&zid)
    }

    pub fn add_edge(&mut self, from: Zid, to: Zid) {
        self.add_vertex(to);
        self.edges.entry(from).or_default().add(to);
    }

    pub fn has_edge(&self, from: Zid, to: Zid) -> bool {
        self.edges
            .get(&from)
            .is_some_and(|targets| targets.contains(to))
    }

    pub fn vertices(&self) -> ZidSet {
        self.edges.keys().copied().collect()
    }

    pub fn edges(&self) -> Vec<(Zid, Zid)> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (*from, to)))
            .collect()
    }

    pub fn successors(&self, zid: Zid) -> ZidSet {
        self.edges.get(&zid).cloned().unwrap_or_default()
    }

    pub fn originators(&self) -> ZidSet {
        let mut result = self.vertices();
        for targets in self.edges.values() {
            result.subtract(targets);
        }
        result
    }

    pub fn terminators(&self) -> ZidSet {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.is_empty())
            .map(|(zid, _)| *zid)
            .collect()
    }

    pub fn transitive_closure(&self, start: Zid) -> Digraph {
        let mut closure = Digraph::new();
        if !self.has_vertex(start) {
            return closure;
        }
        let mut visited = ZidSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.add(current) {
                continue;
            }
            closure.add_vertex(current);
            for next in self.successors(current).iter() {
                closure.add_edge(current, next);
                if !visited.contains(next) {
                    stack.push(next);
                }
            }
        }
        closure
    }

    pub fn reachable_vertices(&self, start: Zid) -> ZidSet {
        let mut visited = ZidSet::new();
        let mut stack: Vec<Zid> = self.successors(start).iter().collect();
        while let Some(current) = stack.pop() {
            if visited.add(current) {
                stack.extend(self.successors(current).iter());
            }
        }
        visited
    }

    pub fn has_cycle(&self) -> bool {
        self.sorted_reverse().is_none()
    }

    pub fn sorted_reverse(&self) -> Option<Vec<Zid>> {
        let mut out_degree: BTreeMap<Zid, usize> = self
            .edges
            .iter()
            .map(|(zid, targets)| (*zid, targets.len()))
            .collect();
        let mut predecessors: BTreeMap<Zid, Vec<Zid>> = BTreeMap::new();
        for (from, to) in self.edges() {
            predecessors.entry(to).or_default().push(from);
        }

        let mut ready: Vec<Zid> = self.terminators().iter().rev().collect();
        let mut result = Vec::with_capacity(self.edges.len());
        while let Some(zid) = ready.pop() {
            result.push(zid);
            let Some(preds) = predecessors.get(&zid) else {
                continue;
            };
            let mut released = Vec::new();
            for pred in preds {
                if let Some(degree) = out_degree.get_mut(pred) {
                    *degree -= 1;
                    if *degree == 0 {
                        released.push(*pred);
                    }
                }
            }
            released.sort_unstable_by(|a, b| b.cmp(a));
            ready.extend(released);
        }

        if result.len() == self.edges.len() {
            Some(result)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "digraph_tests.rs"]
mod tests;
