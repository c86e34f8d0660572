//! Inspectable routing of the signal graph
//!
//! The render side processes a fixed stage order; this is the control-side
//! description of which stages are connected. Every source gets its own
//! strip into the bus, the bus runs through the master chain, and effect
//! stages exist permanently but only carry edges while switched in.
//!
//! ```text
//! Source(Deck d)   → DeckEq(d) → DeckGain(d) ─┐
//! Source(Slices d) → SliceGain(d) ────────────┤
//!                                             ▼
//! Bus → EqBank → [Filter] → [Delay] → [Reverb] → Bass → Mid → Treble
//!     → Color → Presence → MasterGain → AnalysisTap → Destination
//! ```

use std::fmt;

use crate::effect::EffectKind;
use crate::types::DeckId;

/// Identity of an audio source feeding the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    /// A deck's track playback
    Deck(DeckId),
    /// The slice voices triggered from a deck's loop
    Slices(DeckId),
}

/// Typed processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Source(SourceId),
    DeckEq(DeckId),
    DeckGain(DeckId),
    SliceGain(DeckId),
    Bus,
    EqBank,
    Effect(EffectKind),
    Bass,
    Mid,
    Treble,
    Color,
    Presence,
    MasterGain,
    AnalysisTap,
    Destination,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Source(SourceId::Deck(d)) => write!(f, "source:deck{}", d),
            StageKind::Source(SourceId::Slices(d)) => write!(f, "source:slices{}", d),
            StageKind::DeckEq(d) => write!(f, "eq{}", d),
            StageKind::DeckGain(d) => write!(f, "gain{}", d),
            StageKind::SliceGain(d) => write!(f, "slicegain{}", d),
            StageKind::Effect(kind) => write!(f, "{}", kind.name()),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Index of a stage in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Master chain after the effect inserts, in processing order
const POST_EFFECT_CHAIN: [StageKind; 8] = [
    StageKind::Bass,
    StageKind::Mid,
    StageKind::Treble,
    StageKind::Color,
    StageKind::Presence,
    StageKind::MasterGain,
    StageKind::AnalysisTap,
    StageKind::Destination,
];

/// Stages plus directed edges
#[derive(Debug, Clone)]
pub struct Topology {
    stages: Vec<StageKind>,
    edges: Vec<(NodeId, NodeId)>,
    /// Effects currently carrying edges
    effects_on: [bool; 3],
}

impl Topology {
    /// The master chain with every effect switched out and no sources
    pub fn new() -> Self {
        let mut topo = Self {
            stages: Vec::with_capacity(32),
            edges: Vec::with_capacity(48),
            effects_on: [false; 3],
        };
        topo.add(StageKind::Bus);
        topo.add(StageKind::EqBank);
        for kind in EffectKind::ALL {
            topo.add(StageKind::Effect(kind));
        }
        for stage in POST_EFFECT_CHAIN {
            topo.add(stage);
        }
        for pair in POST_EFFECT_CHAIN.windows(2) {
            topo.connect_stages(pair[0], pair[1]);
        }
        topo.connect_stages(StageKind::Bus, StageKind::EqBank);
        topo.rewire_inserts();
        topo
    }

    fn add(&mut self, stage: StageKind) -> NodeId {
        let id = NodeId(self.stages.len());
        self.stages.push(stage);
        id
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
        }
    }

    fn connect_stages(&mut self, from: StageKind, to: StageKind) {
        if let (Some(a), Some(b)) = (self.find(from), self.find(to)) {
            self.connect(a, b);
        }
    }

    /// Look up a stage
    pub fn find(&self, stage: StageKind) -> Option<NodeId> {
        self.stages.iter().position(|s| *s == stage).map(NodeId)
    }

    pub fn stage(&self, id: NodeId) -> Option<StageKind> {
        self.stages.get(id.0).copied()
    }

    /// Attach a source strip; returns the existing node if already attached
    pub fn attach_source(&mut self, source: SourceId) -> NodeId {
        if let Some(existing) = self.find(StageKind::Source(source)) {
            return existing;
        }
        let strip: &[StageKind] = match source {
            SourceId::Deck(d) => &[StageKind::DeckEq(d), StageKind::DeckGain(d)],
            SourceId::Slices(d) => &[StageKind::SliceGain(d)],
        };
        let head = self.add(StageKind::Source(source));
        let mut prev = head;
        for stage in strip {
            let node = self.add(*stage);
            self.connect(prev, node);
            prev = node;
        }
        if let Some(bus) = self.find(StageKind::Bus) {
            self.connect(prev, bus);
        }
        head
    }

    pub fn is_attached(&self, source: SourceId) -> bool {
        self.find(StageKind::Source(source)).is_some()
    }

    /// Switch an effect stage in or out of the master chain
    pub fn set_effect_connected(&mut self, kind: EffectKind, on: bool) {
        if self.effects_on[kind.index()] != on {
            self.effects_on[kind.index()] = on;
            self.rewire_inserts();
        }
    }

    pub fn is_effect_connected(&self, kind: EffectKind) -> bool {
        self.effects_on[kind.index()]
    }

    /// Rebuild the EqBank → ... → Bass segment from the enabled effects
    fn rewire_inserts(&mut self) {
        let segment: Vec<NodeId> = [StageKind::EqBank]
            .into_iter()
            .chain(EffectKind::ALL.into_iter().map(StageKind::Effect))
            .chain([StageKind::Bass])
            .filter_map(|s| self.find(s))
            .collect();
        self.edges
            .retain(|(from, _)| !segment[..segment.len() - 1].contains(from));

        let mut prev = StageKind::EqBank;
        for kind in EffectKind::ALL {
            if self.effects_on[kind.index()] {
                self.connect_stages(prev, StageKind::Effect(kind));
                prev = StageKind::Effect(kind);
            }
        }
        self.connect_stages(prev, StageKind::Bass);
    }

    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(move |(from, _)| *from == id)
            .map(|(_, to)| *to)
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    /// Number of distinct paths between two nodes
    pub fn path_count(&self, from: NodeId, to: NodeId) -> usize {
        if from == to {
            return 1;
        }
        self.successors(from).map(|next| self.path_count(next, to)).sum()
    }

    /// Stage sequence from a source to the destination, if connected
    ///
    /// Follows the first outgoing edge of each stage; with a single path per
    /// source this is the route.
    pub fn route(&self, source: SourceId) -> Option<Vec<StageKind>> {
        let mut node = self.find(StageKind::Source(source))?;
        let mut route = vec![self.stages[node.0]];
        while self.stages[node.0] != StageKind::Destination {
            node = self.successors(node).next()?;
            route.push(self.stages[node.0]);
            if route.len() > self.stages.len() {
                return None;
            }
        }
        Some(route)
    }

    /// Whether the edges contain no cycle
    pub fn is_acyclic(&self) -> bool {
        // Kahn's algorithm
        let mut in_degree = vec![0usize; self.stages.len()];
        for (_, to) in &self.edges {
            in_degree[to.0] += 1;
        }
        let mut ready: Vec<usize> = (0..self.stages.len()).filter(|i| in_degree[*i] == 0).collect();
        let mut visited = 0;
        while let Some(i) = ready.pop() {
            visited += 1;
            for next in self.successors(NodeId(i)) {
                in_degree[next.0] -= 1;
                if in_degree[next.0] == 0 {
                    ready.push(next.0);
                }
            }
        }
        visited == self.stages.len()
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}
