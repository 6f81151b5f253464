//! Condensation of a dependence graph into its strongly connected
//! components. Every internal node belongs to exactly one SCC; every
//! external node gets a pseudo-SCC of its own.

mod impls;
mod tarjan;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::pdg::{DependenceGraph, EdgeId, NodeId};

pub use tarjan::{Graph, Tarjan};

pub type SccId = usize;

#[derive(Clone, Debug)]
pub struct Scc {
	pub id: SccId,
	pub nodes: BTreeSet<NodeId>,
	// pseudo-SCC standing for one live-in or live-out value
	pub external: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SccEdge {
	pub from: SccId,
	pub to: SccId,
	// the dependence edges crossing this pair of SCCs
	pub sub_edges: BTreeSet<EdgeId>,
}

pub struct SccDag {
	pub graph: DependenceGraph,
	pub sccs: BTreeMap<SccId, Scc>,
	pub edges: BTreeMap<(SccId, SccId), SccEdge>,
	node_to_scc: HashMap<NodeId, SccId>,
	next_id: SccId,
}
