//! Program dependence graph over the values of one function. Nodes and
//! edges live in arenas and are addressed by index; a lookup table maps
//! program values to their node.

mod builder;

use std::{
	collections::{BTreeSet, HashMap},
	fmt::Display,
};

use llvm::{BlockId, Temp};
use rrvm::{InstrId, LlvmFunc};
use rrvm_derive::SnakeDisplay;

pub use builder::PdgBuilder;

pub type NodeId = usize;
pub type EdgeId = usize;

/// An operation result or a function argument. Constants are not nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PdgValue {
	Instr(InstrId),
	Param(Temp),
}

impl PdgValue {
	pub fn instr(&self) -> Option<InstrId> {
		match self {
			Self::Instr(id) => Some(*id),
			Self::Param(_) => None,
		}
	}
}

impl Display for PdgValue {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Instr(id) => write!(f, "{}", id),
			Self::Param(t) => write!(f, "{}", t),
		}
	}
}

#[derive(SnakeDisplay, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepKind {
	Register,
	Memory,
	Control,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepEdge {
	pub from: NodeId,
	pub to: NodeId,
	pub kind: DepKind,
	pub is_must: bool,
	// read after write, as opposed to write after write / write after read
	pub is_raw: bool,
}

impl DepEdge {
	pub fn is_memory(&self) -> bool {
		self.kind == DepKind::Memory
	}
	pub fn is_data(&self) -> bool {
		self.kind != DepKind::Control
	}
}

#[derive(Clone, Debug)]
pub struct DepNode {
	pub value: PdgValue,
	// external nodes stand for values living outside the analysed region
	pub internal: bool,
	pub incoming: Vec<EdgeId>,
	pub outgoing: Vec<EdgeId>,
}

#[derive(Clone, Debug, Default)]
pub struct DependenceGraph {
	pub nodes: Vec<DepNode>,
	pub edges: Vec<DepEdge>,
	index: HashMap<PdgValue, NodeId>,
}

impl DependenceGraph {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the node of `value`, creating it when missing.
	pub fn add_node(&mut self, value: PdgValue, internal: bool) -> NodeId {
		if let Some(&id) = self.index.get(&value) {
			return id;
		}
		let id = self.nodes.len();
		self.index.insert(value.clone(), id);
		self.nodes.push(DepNode {
			value,
			internal,
			incoming: Vec::new(),
			outgoing: Vec::new(),
		});
		id
	}

	pub fn add_edge(
		&mut self,
		from: NodeId,
		to: NodeId,
		kind: DepKind,
		is_must: bool,
		is_raw: bool,
	) -> EdgeId {
		let id = self.edges.len();
		self.edges.push(DepEdge {
			from,
			to,
			kind,
			is_must,
			is_raw,
		});
		self.nodes[from].outgoing.push(id);
		self.nodes[to].incoming.push(id);
		id
	}

	pub fn node_of(&self, value: &PdgValue) -> Option<NodeId> {
		self.index.get(value).copied()
	}

	pub fn node_of_instr(&self, id: InstrId) -> Option<NodeId> {
		self.node_of(&PdgValue::Instr(id))
	}

	pub fn value(&self, node: NodeId) -> &PdgValue {
		&self.nodes[node].value
	}

	pub fn edge(&self, edge: EdgeId) -> &DepEdge {
		&self.edges[edge]
	}

	pub fn is_internal(&self, node: NodeId) -> bool {
		self.nodes[node].internal
	}

	pub fn internal_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
		(0..self.nodes.len()).filter(|&n| self.nodes[n].internal)
	}

	pub fn external_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
		(0..self.nodes.len()).filter(|&n| !self.nodes[n].internal)
	}

	pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &DepEdge> {
		self.nodes[node].outgoing.iter().map(|&e| &self.edges[e])
	}

	pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = &DepEdge> {
		self.nodes[node].incoming.iter().map(|&e| &self.edges[e])
	}

	pub fn edges_of_kind(&self, kind: DepKind) -> impl Iterator<Item = &DepEdge> {
		self.edges.iter().filter(move |e| e.kind == kind)
	}

	/// Restricts the graph to the instructions placed in `blocks`. Values
	/// outside the region that exchange registers with it (live-ins and
	/// live-outs) become external nodes; every other outside value and edge
	/// is dropped.
	pub fn loop_subgraph(
		&self,
		func: &LlvmFunc,
		blocks: &BTreeSet<BlockId>,
	) -> DependenceGraph {
		let block_of = func.instr_block_map();
		let inside = |node: NodeId| match &self.nodes[node].value {
			PdgValue::Instr(id) => {
				block_of.get(id).map_or(false, |b| blocks.contains(b))
			}
			PdgValue::Param(_) => false,
		};
		let mut sub = DependenceGraph::new();
		for node in (0..self.nodes.len()).filter(|&n| inside(n)) {
			sub.add_node(self.nodes[node].value.clone(), true);
		}
		for edge in self.edges.iter() {
			let (from_in, to_in) = (inside(edge.from), inside(edge.to));
			if !from_in && !to_in {
				continue;
			}
			if (!from_in || !to_in) && edge.kind != DepKind::Register {
				continue;
			}
			let from = sub.add_node(self.nodes[edge.from].value.clone(), from_in);
			let to = sub.add_node(self.nodes[edge.to].value.clone(), to_in);
			sub.add_edge(from, to, edge.kind, edge.is_must, edge.is_raw);
		}
		sub
	}
}

impl Display for DependenceGraph {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		for (id, node) in self.nodes.iter().enumerate() {
			let scope = if node.internal { "" } else { " (external)" };
			writeln!(f, "node {}: {}{}", id, node.value, scope)?;
		}
		for edge in self.edges.iter() {
			let must = if edge.is_must { "must" } else { "may" };
			let raw = if edge.is_raw { "raw" } else { "war/waw" };
			writeln!(
				f,
				"  {} -> {} [{}, {}, {}]",
				self.nodes[edge.from].value,
				self.nodes[edge.to].value,
				edge.kind,
				must,
				raw
			)?;
		}
		Ok(())
	}
}
