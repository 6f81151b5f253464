use std::{
	collections::{BTreeSet, HashMap, VecDeque},
	fmt::Display,
};

use log::{debug, trace};
use utils::{errors::Result, RrvmError, UnionFind};

use super::{Graph, Scc, SccDag, SccEdge, SccId, Tarjan};
use crate::pdg::{DependenceGraph, NodeId, PdgValue};

struct SubGraph<'a> {
	graph: &'a DependenceGraph,
	nodes: &'a [NodeId],
	local: HashMap<NodeId, usize>,
}

impl<'a> SubGraph<'a> {
	fn new(graph: &'a DependenceGraph, nodes: &'a [NodeId]) -> Self {
		let local = nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
		Self {
			graph,
			nodes,
			local,
		}
	}

	fn top_level(&self) -> Vec<usize> {
		(0..self.nodes.len())
			.filter(|&u| {
				self
					.graph
					.incoming(self.nodes[u])
					.all(|e| !self.local.contains_key(&e.from))
			})
			.collect()
	}
}

impl<'a> Graph for SubGraph<'a> {
	fn next(&self, u: usize) -> Box<dyn Iterator<Item = usize> + '_> {
		Box::new(
			self
				.graph
				.outgoing(self.nodes[u])
				.filter_map(|e| self.local.get(&e.to).copied()),
		)
	}
}

impl SccDag {
	pub fn new(graph: DependenceGraph) -> Self {
		let internal: Vec<NodeId> = graph.internal_nodes().collect();
		let mut uf = UnionFind::default();
		for edge in graph.edges.iter() {
			if graph.is_internal(edge.from) && graph.is_internal(edge.to) {
				uf.merge(edge.from, edge.to);
			}
		}
		let mut components = Vec::new();
		for nodes in uf.classes(internal) {
			let sub = SubGraph::new(&graph, &nodes);
			let seeds = sub.top_level();
			let mut sccs = Tarjan::new(nodes.len()).work(&sub, &seeds);
			sccs.reverse();
			components.extend(
				sccs
					.into_iter()
					.map(|scc| scc.into_iter().map(|u| nodes[u]).collect::<BTreeSet<_>>()),
			);
		}
		let externals: Vec<NodeId> = graph.external_nodes().collect();

		let mut dag = Self {
			graph,
			sccs: Default::default(),
			edges: Default::default(),
			node_to_scc: HashMap::new(),
			next_id: 0,
		};
		for nodes in components {
			dag.add_scc(nodes, false);
		}
		for node in externals {
			dag.add_scc(BTreeSet::from([node]), true);
		}
		dag.rebuild_edges();
		debug!(
			"sccdag: {} sccs, {} internal, {} edges",
			dag.sccs.len(),
			dag.internal_sccs().count(),
			dag.edges.len()
		);
		dag
	}

	fn add_scc(&mut self, nodes: BTreeSet<NodeId>, external: bool) -> SccId {
		let id = self.next_id;
		self.next_id += 1;
		for &node in nodes.iter() {
			self.node_to_scc.insert(node, id);
		}
		self.sccs.insert(
			id,
			Scc {
				id,
				nodes,
				external,
			},
		);
		id
	}

	fn rebuild_index(&mut self) {
		self.node_to_scc = self
			.sccs
			.values()
			.flat_map(|scc| scc.nodes.iter().map(move |&n| (n, scc.id)))
			.collect();
	}

	/// Recomputes every condensation edge. An existing edge keeps its
	/// identity; its sub-edge set is cleared the first time the pass touches
	/// it, and edges the pass never touches are dropped.
	fn rebuild_edges(&mut self) {
		let Self {
			graph,
			sccs,
			edges,
			node_to_scc,
			..
		} = self;
		let mut touched = BTreeSet::new();
		for scc in sccs.values() {
			for &node in scc.nodes.iter() {
				for &edge_id in graph.nodes[node].outgoing.iter() {
					let Some(&to) = node_to_scc.get(&graph.edges[edge_id].to) else {
						continue;
					};
					if to == scc.id {
						continue;
					}
					let key = (scc.id, to);
					let edge = edges.entry(key).or_insert_with(|| SccEdge {
						from: scc.id,
						to,
						sub_edges: BTreeSet::new(),
					});
					if touched.insert(key) {
						edge.sub_edges.clear();
					}
					edge.sub_edges.insert(edge_id);
				}
			}
		}
		edges.retain(|key, _| touched.contains(key));
	}

	/// Fuses at least two internal SCCs into a new one and re-derives the
	/// node map and all edges. Fails when the fusion would close a cycle
	/// through an SCC left outside the set.
	pub fn merge(&mut self, set: &BTreeSet<SccId>) -> Result<SccId> {
		if set.len() < 2 {
			return Err(RrvmError::Unsupported(format!(
				"merging {} scc(s)",
				set.len()
			)));
		}
		for id in set.iter() {
			match self.sccs.get(id) {
				Some(scc) if !scc.external => {}
				_ => {
					return Err(RrvmError::Unsupported(format!(
						"scc {} is not an internal scc",
						id
					)))
				}
			}
		}
		let forward = self.reach(set, true);
		let backward = self.reach(set, false);
		if let Some(between) = forward.intersection(&backward).next() {
			return Err(RrvmError::Unsupported(format!(
				"merging {:?} would put scc {} on a cycle",
				set, between
			)));
		}
		let mut nodes = BTreeSet::new();
		for id in set.iter() {
			if let Some(scc) = self.sccs.remove(id) {
				nodes.extend(scc.nodes);
			}
		}
		let id = self.add_scc(nodes, false);
		self.rebuild_index();
		self.rebuild_edges();
		trace!("merged {:?} into scc {}", set, id);
		Ok(id)
	}

	/// SCCs outside `set` reachable from it (or reaching it).
	fn reach(&self, set: &BTreeSet<SccId>, forward: bool) -> BTreeSet<SccId> {
		let mut seen = BTreeSet::new();
		let mut queue: VecDeque<SccId> = set.iter().copied().collect();
		while let Some(u) = queue.pop_front() {
			let next: Vec<SccId> = if forward {
				self.successors(u).collect()
			} else {
				self.predecessors(u).collect()
			};
			for v in next {
				if !set.contains(&v) && seen.insert(v) {
					queue.push_back(v);
				}
			}
		}
		seen
	}

	pub fn scc(&self, id: SccId) -> &Scc {
		&self.sccs[&id]
	}

	pub fn scc_of(&self, node: NodeId) -> Option<SccId> {
		self.node_to_scc.get(&node).copied()
	}

	pub fn scc_of_value(&self, value: &PdgValue) -> Option<SccId> {
		self.scc_of(self.graph.node_of(value)?)
	}

	pub fn contains(&self, value: &PdgValue) -> bool {
		self.scc_of_value(value).is_some()
	}

	pub fn number_of_instructions(&self, id: SccId) -> usize {
		self
			.scc(id)
			.nodes
			.iter()
			.filter(|&&n| self.graph.value(n).instr().is_some())
			.count()
	}

	pub fn internal_sccs(&self) -> impl Iterator<Item = SccId> + '_ {
		self.sccs.values().filter(|s| !s.external).map(|s| s.id)
	}

	pub fn external_sccs(&self) -> impl Iterator<Item = SccId> + '_ {
		self.sccs.values().filter(|s| s.external).map(|s| s.id)
	}

	pub fn successors(&self, id: SccId) -> impl Iterator<Item = SccId> + '_ {
		self.edges.range((id, 0)..(id + 1, 0)).map(|(&(_, to), _)| to)
	}

	pub fn predecessors(&self, id: SccId) -> impl Iterator<Item = SccId> + '_ {
		self
			.edges
			.keys()
			.filter(move |(_, to)| *to == id)
			.map(|&(from, _)| from)
	}

	pub fn edge(&self, from: SccId, to: SccId) -> Option<&SccEdge> {
		self.edges.get(&(from, to))
	}

	/// Internal SCCs no other internal SCC points to.
	pub fn top_level_nodes(&self) -> Vec<SccId> {
		self
			.internal_sccs()
			.filter(|&id| self.predecessors(id).all(|p| self.scc(p).external))
			.collect()
	}

	/// Internal SCCs directly depending on `id`.
	pub fn next_depth_nodes(&self, id: SccId) -> Vec<SccId> {
		self.successors(id).filter(|&s| !self.scc(s).external).collect()
	}

	pub fn is_acyclic(&self) -> bool {
		self.kahn(|_| true).len() == self.sccs.len()
	}

	/// Internal SCCs, every one after all the SCCs it depends on; ties go
	/// to the smaller id.
	pub fn topological_order(&self) -> Vec<SccId> {
		self.kahn(|scc| !scc.external)
	}

	fn kahn(&self, keep: impl Fn(&Scc) -> bool) -> Vec<SccId> {
		let kept: BTreeSet<SccId> =
			self.sccs.values().filter(|s| keep(s)).map(|s| s.id).collect();
		let mut degree: HashMap<SccId, usize> = kept.iter().map(|&id| (id, 0)).collect();
		for &(from, to) in self.edges.keys() {
			if kept.contains(&from) && kept.contains(&to) {
				*degree.entry(to).or_default() += 1;
			}
		}
		let mut ready: BTreeSet<SccId> =
			kept.iter().copied().filter(|id| degree[id] == 0).collect();
		let mut order = Vec::new();
		while let Some(u) = ready.pop_first() {
			order.push(u);
			for v in self.successors(u).filter(|v| kept.contains(v)) {
				let d = degree.entry(v).or_default();
				*d -= 1;
				if *d == 0 {
					ready.insert(v);
				}
			}
		}
		order
	}
}

impl Display for SccDag {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		for scc in self.sccs.values() {
			let values: Vec<String> = scc
				.nodes
				.iter()
				.map(|&n| self.graph.value(n).to_string())
				.collect();
			let kind = if scc.external { "external" } else { "scc" };
			writeln!(f, "{} {}: {}", kind, scc.id, values.join(" "))?;
		}
		for edge in self.edges.values() {
			writeln!(
				f,
				"  {} -> {} ({} sub-edges)",
				edge.from,
				edge.to,
				edge.sub_edges.len()
			)?;
		}
		Ok(())
	}
}
