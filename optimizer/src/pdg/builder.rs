use std::collections::HashMap;

use llvm::{InstrCategory, MemoryAccess};
use log::{debug, trace};
use rrvm::{InstrId, LlvmFunc};

use super::{DepKind, DependenceGraph, NodeId, PdgValue};
use crate::oracle::{
	AliasOracle, AliasResult, ModRefOracle, ModRefResult, PostDominance,
};

/// Builds the dependence graph of a whole function from the answers of
/// the alias, mod-ref and post-dominance oracles.
pub struct PdgBuilder<'a> {
	func: &'a LlvmFunc,
	alias: &'a dyn AliasOracle,
	mod_ref: &'a dyn ModRefOracle,
	post_dom: &'a dyn PostDominance,
	graph: DependenceGraph,
}

impl<'a> PdgBuilder<'a> {
	pub fn new(
		func: &'a LlvmFunc,
		alias: &'a dyn AliasOracle,
		mod_ref: &'a dyn ModRefOracle,
		post_dom: &'a dyn PostDominance,
	) -> Self {
		Self {
			func,
			alias,
			mod_ref,
			post_dom,
			graph: DependenceGraph::new(),
		}
	}

	pub fn build(mut self) -> DependenceGraph {
		for param in self.func.params.iter() {
			self.graph.add_node(PdgValue::Param(param.clone()), false);
		}
		for id in self.func.all_instrs() {
			self.graph.add_node(PdgValue::Instr(id), true);
		}
		self.add_register_edges();
		self.add_memory_edges();
		self.add_control_edges();
		debug!(
			"pdg of {}: {} nodes, {} edges",
			self.func.name,
			self.graph.nodes.len(),
			self.graph.edges.len()
		);
		self.graph
	}

	fn node(&self, id: InstrId) -> NodeId {
		match self.graph.node_of_instr(id) {
			Some(node) => node,
			None => unreachable!("{} is not placed in {}", id, self.func.name),
		}
	}

	fn add_register_edges(&mut self) {
		let def_map = self.func.def_map();
		for user in self.func.all_instrs() {
			for temp in self.func.instr(user).get_read() {
				if temp.is_global {
					continue;
				}
				let from = match def_map.get(&temp) {
					Some(def) => self.node(*def),
					None if self.func.is_param(&temp) => {
						match self.graph.node_of(&PdgValue::Param(temp)) {
							Some(node) => node,
							None => continue,
						}
					}
					None => continue,
				};
				let to = self.node(user);
				self.graph.add_edge(from, to, DepKind::Register, true, true);
			}
		}
	}

	fn add_memory_edges(&mut self) {
		let accesses: Vec<(InstrId, InstrCategory)> = self
			.func
			.all_instrs()
			.into_iter()
			.map(|id| (id, self.func.instr(id).category()))
			.filter(|(_, c)| matches!(c, InstrCategory::Memory(_) | InstrCategory::Call))
			.collect();
		for (i, &(a, cat_a)) in accesses.iter().enumerate() {
			for &(b, cat_b) in accesses[i..].iter() {
				match (cat_a, cat_b) {
					(InstrCategory::Memory(x), InstrCategory::Memory(y)) if a != b => {
						self.memory_pair(a, x, b, y)
					}
					(InstrCategory::Call, InstrCategory::Memory(y)) => {
						self.call_location(a, b, y)
					}
					(InstrCategory::Memory(x), InstrCategory::Call) => {
						self.call_location(b, a, x)
					}
					(InstrCategory::Call, InstrCategory::Call) => {
						self.call_pair(a, b);
						if a != b {
							self.call_pair(b, a);
						}
					}
					_ => {}
				}
			}
		}
	}

	fn memory_pair(
		&mut self,
		a: InstrId,
		access_a: MemoryAccess,
		b: InstrId,
		access_b: MemoryAccess,
	) {
		let result = self.alias.alias(self.func, a, b);
		if result == AliasResult::NoAlias {
			return;
		}
		let is_must = result == AliasResult::MustAlias;
		let (na, nb) = (self.node(a), self.node(b));
		trace!("memory {} {}: {}", self.func.instr(a), self.func.instr(b), result);
		match (access_a, access_b) {
			(MemoryAccess::Store, MemoryAccess::Store) => {
				self.graph.add_edge(na, nb, DepKind::Memory, is_must, false);
				self.graph.add_edge(nb, na, DepKind::Memory, is_must, false);
			}
			(MemoryAccess::Store, MemoryAccess::Load) => {
				self.graph.add_edge(na, nb, DepKind::Memory, is_must, true);
				self.graph.add_edge(nb, na, DepKind::Memory, is_must, false);
			}
			(MemoryAccess::Load, MemoryAccess::Store) => {
				self.graph.add_edge(nb, na, DepKind::Memory, is_must, true);
				self.graph.add_edge(na, nb, DepKind::Memory, is_must, false);
			}
			(MemoryAccess::Load, MemoryAccess::Load) => {}
		}
	}

	fn call_location(&mut self, call: InstrId, loc: InstrId, access: MemoryAccess) {
		let result = self.mod_ref.mod_ref(self.func, call, loc);
		let (nc, nl) = (self.node(call), self.node(loc));
		match access {
			MemoryAccess::Store => {
				if result == ModRefResult::NoModRef {
					return;
				}
				if result.may_ref() {
					self.graph.add_edge(nl, nc, DepKind::Memory, false, true);
				}
				if result.may_mod() {
					self.graph.add_edge(nl, nc, DepKind::Memory, false, false);
				}
				// a later store must not overtake what the call touches
				self.graph.add_edge(nc, nl, DepKind::Memory, false, false);
			}
			MemoryAccess::Load => {
				if result.may_mod() {
					self.graph.add_edge(nc, nl, DepKind::Memory, false, true);
					self.graph.add_edge(nl, nc, DepKind::Memory, false, false);
				}
			}
		}
	}

	fn call_pair(&mut self, a: InstrId, b: InstrId) {
		let result = self.mod_ref.mod_ref(self.func, a, b);
		if result != ModRefResult::NoModRef {
			let (na, nb) = (self.node(a), self.node(b));
			self.graph.add_edge(na, nb, DepKind::Memory, false, result.may_mod());
		}
	}

	/// Block `y` is control dependent on a branching block `x` when it
	/// post-dominates a successor of `x` without strictly post-dominating `x`.
	fn add_control_edges(&mut self) {
		let blocks: Vec<_> = self.func.blocks.keys().copied().collect();
		let mut dependents: HashMap<InstrId, Vec<InstrId>> = HashMap::new();
		for &x in blocks.iter() {
			let succ = self.func.successors(x);
			if succ.len() < 2 {
				continue;
			}
			let Some(branch) = self.func.block(x).jump_instr else {
				continue;
			};
			for &y in blocks.iter() {
				let strictly = y != x && self.post_dom.post_dominates(y, x);
				if strictly || !succ.iter().any(|&s| self.post_dom.post_dominates(y, s))
				{
					continue;
				}
				dependents
					.entry(branch)
					.or_default()
					.extend(self.func.block(y).instr_ids());
			}
		}
		let mut branches: Vec<_> = dependents.into_iter().collect();
		branches.sort_by_key(|(branch, _)| *branch);
		for (branch, instrs) in branches {
			let from = self.node(branch);
			for instr in instrs {
				let to = self.node(instr);
				self.graph.add_edge(from, to, DepKind::Control, true, false);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::oracle::{BasicAliasAnalysis, ConservativeOracle};
	use llvm::*;
	use rrvm::{dominator::DomTree, samples::*, LlvmGen};

	fn build(func: &LlvmFunc, oracle: &BasicAliasAnalysis) -> DependenceGraph {
		let post_dom = DomTree::new(func, true);
		PdgBuilder::new(func, oracle, oracle, &post_dom).build()
	}

	#[test]
	fn test_one_register_edge_per_use() {
		for sample in all_samples() {
			let program = (sample.build)();
			for func in program.funcs.iter() {
				let oracle = BasicAliasAnalysis::new(func, false);
				let graph = build(func, &oracle);
				let uses: usize = func
					.all_instrs()
					.into_iter()
					.map(|id| {
						func.instr(id).get_read().iter().filter(|t| !t.is_global).count()
					})
					.sum();
				let edges = graph.edges_of_kind(DepKind::Register).count();
				assert_eq!(uses, edges, "{}::{}", sample.name, func.name);
			}
		}
	}

	#[test]
	fn test_square_has_two_edges_from_load() {
		let program = sum_squares(8);
		let func = &program.funcs[0];
		let oracle = BasicAliasAnalysis::new(func, false);
		let graph = build(func, &oracle);
		let sq = func
			.all_instrs()
			.into_iter()
			.find(|&id| {
				func.instr(id).get_write().map_or(false, |t| t.name == "sq")
			})
			.unwrap();
		let node = graph.node_of_instr(sq).unwrap();
		let registers = graph
			.incoming(node)
			.filter(|e| e.kind == DepKind::Register)
			.count();
		assert_eq!(registers, 2);
	}

	#[test]
	fn test_distinct_arrays_do_not_depend() {
		let program = array_scale(8);
		let func = &program.funcs[0];
		let oracle = BasicAliasAnalysis::new(func, false);
		let graph = build(func, &oracle);
		let loops = func.loop_analysis();
		// the scaling loop reads a and writes b
		let sub = graph.loop_subgraph(func, &loops[1].blocks);
		assert_eq!(sub.edges.iter().filter(|e| e.is_memory()).count(), 0);
	}

	#[test]
	fn test_conservative_oracle_keeps_edges() {
		let program = array_scale(8);
		let func = &program.funcs[0];
		let post_dom = DomTree::new(func, true);
		let oracle = ConservativeOracle;
		let graph = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
		let loops = func.loop_analysis();
		let sub = graph.loop_subgraph(func, &loops[1].blocks);
		// load/store in both directions, may and not must
		let memory: Vec<_> = sub.edges.iter().filter(|e| e.is_memory()).collect();
		assert_eq!(memory.len(), 2);
		assert!(memory.iter().all(|e| !e.is_must));
		assert_eq!(memory.iter().filter(|e| e.is_raw).count(), 1);
	}

	#[test]
	fn test_io_calls_are_ordered() {
		let program = pipeline_io(4);
		let func = &program.funcs[0];
		let oracle = BasicAliasAnalysis::new(func, false);
		let graph = build(func, &oracle);
		let call = func
			.all_instrs()
			.into_iter()
			.find(|&id| func.instr(id).category() == InstrCategory::Call)
			.unwrap();
		let node = graph.node_of_instr(call).unwrap();
		assert!(graph.outgoing(node).any(|e| e.to == node && e.is_memory()));
	}

	#[test]
	fn test_store_and_reading_call_are_ordered_both_ways() {
		let program = shared_cell(4);
		let func = program.get_func("main").unwrap();
		let oracle = BasicAliasAnalysis::new(func, false);
		let graph = build(func, &oracle);
		let find = |category: InstrCategory| {
			func
				.all_instrs()
				.into_iter()
				.find(|&id| func.instr(id).category() == category)
				.and_then(|id| graph.node_of_instr(id))
				.unwrap()
		};
		let store = find(InstrCategory::Memory(MemoryAccess::Store));
		let call = find(InstrCategory::Call);
		let memory = |from, to| graph.outgoing(from).any(|e| e.to == to && e.is_memory());
		assert!(memory(store, call));
		assert!(memory(call, store));
	}

	#[test]
	fn test_control_dependence() {
		// entry: br c, then, join; then: store; join: ret
		let mut mgr = TempManager::new();
		let x = mgr.new_temp_with_name("x", VarType::I32);
		let p = mgr.new_temp_with_name("p", VarType::I32Ptr);
		let mut func =
			LlvmFunc::new("f", VarType::Void, vec![x.clone(), p.clone()]);
		let mut gen = LlvmGen::new(&mut func, &mut mgr, 0);
		let then = gen.new_block();
		let join = gen.new_block();
		let c = gen.visit_comp_instr(x.clone().into(), CompOp::SGT, 0.into());
		gen.visit_jump_cond_instr(c.into(), then, join);
		gen.switch_to(then);
		let store = gen.visit_store_instr(x.into(), p.into());
		gen.visit_jump_instr(join);
		gen.switch_to(join);
		gen.visit_ret_instr(None);
		gen.visit_end();

		let oracle = BasicAliasAnalysis::new(&func, false);
		let graph = build(&func, &oracle);
		let branch = func.block(0).jump_instr.unwrap();
		let from = graph.node_of_instr(branch).unwrap();
		let targets: Vec<_> = graph
			.outgoing(from)
			.filter(|e| e.kind == DepKind::Control)
			.map(|e| graph.value(e.to).clone())
			.collect();
		// the store and the jump of `then`, nothing of `join`
		assert_eq!(targets.len(), 2);
		assert!(targets.contains(&PdgValue::Instr(store)));
	}

	#[test]
	fn test_loop_subgraph_externals() {
		let program = param_scale(8);
		let func = &program.funcs[0];
		let oracle = BasicAliasAnalysis::new(func, false);
		let graph = build(func, &oracle);
		let loops = func.loop_analysis();
		let sub = graph.loop_subgraph(func, &loops[0].blocks);
		let externals: Vec<_> =
			sub.external_nodes().map(|n| sub.value(n).to_string()).collect();
		// both arrays and the bound flow in; nothing leaves
		assert_eq!(externals.len(), 3);
		assert!(externals.contains(&"%n".to_string()));
		for node in sub.external_nodes() {
			assert!(sub.incoming(node).next().is_none());
		}
	}
}
