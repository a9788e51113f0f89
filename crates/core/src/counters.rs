use std::collections::BTreeMap;

use crate::graph::TaskGraph;
use crate::task::NodeId;

/// One counter change applied by a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAdjustment {
    pub node: NodeId,
    pub before: u32,
    pub after: u32,
}

/// Per-run execution counters and exceed-latches, indexed by node.
///
/// Counters only change through [`Counters::commit`], once per executed node.
#[derive(Debug, Clone)]
pub struct Counters {
    exec_times: Vec<u32>,
    latched: Vec<bool>,
}

impl Counters {
    pub fn new(len: usize) -> Self {
        Self { exec_times: vec![0; len], latched: vec![false; len] }
    }

    pub fn reset(&mut self) {
        self.exec_times.iter_mut().for_each(|c| *c = 0);
        self.latched.iter_mut().for_each(|l| *l = false);
    }

    pub fn exec_times(&self, id: NodeId) -> u32 {
        self.exec_times[id.0]
    }

    pub fn is_latched(&self, id: NodeId) -> bool {
        self.latched[id.0]
    }

    /// Record one execution of `id`: increment it, decrement every node in its
    /// `reduce_other_times` (floored at zero) and close its latch when it
    /// reaches `max_times`. All adjustments are computed first and applied
    /// together.
    pub fn commit(&mut self, graph: &TaskGraph, id: NodeId) -> Vec<CounterAdjustment> {
        let node = graph.node(id);
        let mut next = self.exec_times.clone();
        let mut adjustments = Vec::with_capacity(1 + node.reduce_other_times.len());

        next[id.0] = next[id.0].saturating_add(1);
        adjustments.push(CounterAdjustment { node: id, before: self.exec_times[id.0], after: next[id.0] });

        for &other in &node.reduce_other_times {
            let before = next[other.0];
            next[other.0] = before.saturating_sub(1);
            adjustments.push(CounterAdjustment { node: other, before, after: next[other.0] });
        }

        let latch = next[id.0] >= node.max_times;
        self.exec_times = next;
        if latch {
            self.latched[id.0] = true;
        }
        adjustments
    }

    /// `exec_times` of every node, by name.
    pub fn snapshot(&self, graph: &TaskGraph) -> BTreeMap<String, u32> {
        graph.nodes().map(|(id, n)| (n.name.clone(), self.exec_times[id.0])).collect()
    }
}
