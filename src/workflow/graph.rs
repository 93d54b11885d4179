//! The fixed node/edge table of the writing workflow.
//!
//! Every exit belongs to exactly one node and names exactly one target, so
//! the table is total by construction: [`Exit::source`] and
//! [`Exit::target`] are exhaustive matches the compiler checks.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeName {
    MemorySelect,
    Draft,
    Review,
    Revise,
    MemoryExtract,
    MemoryConfirm,
}

impl NodeName {
    /// Nodes that pause for a human decision.
    pub const fn is_suspension_point(self) -> bool {
        matches!(self, Self::Review | Self::MemoryConfirm)
    }
}

/// Where an exit leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Node(NodeName),
    End,
}

/// Every way a node can finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Exit {
    Selected,
    Drafted,
    Approved,
    RevisionRequested,
    Rejected,
    Revised,
    CandidatesFound,
    NothingLearned,
    Confirmed,
}

impl Exit {
    pub const fn source(self) -> NodeName {
        match self {
            Self::Selected => NodeName::MemorySelect,
            Self::Drafted => NodeName::Draft,
            Self::Approved | Self::RevisionRequested | Self::Rejected => NodeName::Review,
            Self::Revised => NodeName::Revise,
            Self::CandidatesFound | Self::NothingLearned => NodeName::MemoryExtract,
            Self::Confirmed => NodeName::MemoryConfirm,
        }
    }

    pub const fn target(self) -> Target {
        match self {
            Self::Selected => Target::Node(NodeName::Draft),
            Self::Drafted | Self::Revised => Target::Node(NodeName::Review),
            Self::Approved => Target::Node(NodeName::MemoryExtract),
            Self::RevisionRequested => Target::Node(NodeName::Revise),
            Self::CandidatesFound => Target::Node(NodeName::MemoryConfirm),
            Self::Rejected | Self::NothingLearned | Self::Confirmed => Target::End,
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: NodeName,
    pub on: Exit,
    pub to: Target,
}

/// The node every task enters first.
pub const ENTRY: NodeName = NodeName::MemorySelect;

/// Selection over an empty memory list is always empty, so tasks without
/// stored memories go straight to drafting.
pub const fn entry_node(has_memories: bool) -> NodeName {
    if has_memories { ENTRY } else { NodeName::Draft }
}

/// The full transition table, in declaration order.
pub fn transitions() -> Vec<Transition> {
    Exit::iter()
        .map(|on| Transition {
            from: on.source(),
            on,
            to: on.target(),
        })
        .collect()
}

/// Exits available from a node.
pub fn exits_from(node: NodeName) -> Vec<Exit> {
    Exit::iter().filter(|exit| exit.source() == node).collect()
}

/// Check the table: every node is reachable from the entry, every node can
/// reach a terminal state, and every cycle passes through a suspension
/// point (so a single run always halts).
pub fn validate() -> Result<()> {
    let mut adjacency: BTreeMap<NodeName, Vec<NodeName>> = BTreeMap::new();
    let mut terminal_sources = BTreeSet::new();

    for node in NodeName::iter() {
        adjacency.entry(node).or_default();
        if exits_from(node).is_empty() {
            bail!("node has no exits: {node}");
        }
    }

    for transition in transitions() {
        match transition.to {
            Target::Node(next) => adjacency.entry(transition.from).or_default().push(next),
            Target::End => {
                terminal_sources.insert(transition.from);
            }
        }
    }

    let reachable = reachable_from(ENTRY, &adjacency);
    if let Some(orphan) = NodeName::iter().find(|node| !reachable.contains(node)) {
        bail!("node unreachable from {ENTRY}: {orphan}");
    }

    for node in NodeName::iter() {
        let downstream = reachable_from(node, &adjacency);
        if !downstream.iter().any(|n| terminal_sources.contains(n)) {
            bail!("node cannot reach a terminal state: {node}");
        }
    }

    // Drop suspension points; what remains must be acyclic.
    let running: BTreeMap<NodeName, Vec<NodeName>> = adjacency
        .iter()
        .filter(|(node, _)| !node.is_suspension_point())
        .map(|(node, next)| {
            let next = next
                .iter()
                .copied()
                .filter(|n| !n.is_suspension_point())
                .collect();
            (*node, next)
        })
        .collect();
    for node in running.keys() {
        let downstream = reachable_from_strict(*node, &running);
        if downstream.contains(node) {
            bail!("cycle without a suspension point through {node}");
        }
    }

    Ok(())
}

fn reachable_from(
    start: NodeName,
    adjacency: &BTreeMap<NodeName, Vec<NodeName>>,
) -> BTreeSet<NodeName> {
    let mut seen = BTreeSet::from([start]);
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for next in adjacency.get(&node).into_iter().flatten() {
            if seen.insert(*next) {
                stack.push(*next);
            }
        }
    }
    seen
}

/// Like [`reachable_from`] but excludes `start` unless a path returns to it.
fn reachable_from_strict(
    start: NodeName,
    adjacency: &BTreeMap<NodeName, Vec<NodeName>>,
) -> BTreeSet<NodeName> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<NodeName> = adjacency.get(&start).cloned().unwrap_or_default();
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            stack.extend(adjacency.get(&node).into_iter().flatten().copied());
        }
    }
    seen
}
