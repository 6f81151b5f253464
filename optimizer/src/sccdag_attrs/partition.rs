use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use log::debug;
use rrvm::InstrId;
use utils::{errors::Result, RrvmError};

use super::SccAttrs;
use crate::sccdag::{SccDag, SccId};

/// Caller supplied grouping: SCCs holding instructions with the same key
/// share a stage.
pub type PartitionHints = HashMap<InstrId, u32>;

/// Assignment of every non-removable internal SCC to a pipeline stage.
#[derive(Clone, Debug, Default)]
pub struct Partition {
	pub stages: Vec<BTreeSet<SccId>>,
	scc_stage: BTreeMap<SccId, usize>,
}

impl Partition {
	pub fn new(
		dag: &SccDag,
		attrs: &SccAttrs,
		hints: &PartitionHints,
	) -> Result<Self> {
		let mut partition = Self::default();
		let mut group_stage: HashMap<u32, usize> = HashMap::new();

		let mut degree: HashMap<SccId, usize> = HashMap::new();
		for id in dag.internal_sccs() {
			for next in dag.next_depth_nodes(id) {
				*degree.entry(next).or_default() += 1;
			}
		}
		let mut queue: VecDeque<SccId> = dag.top_level_nodes().into();
		while let Some(id) = queue.pop_front() {
			for next in dag.next_depth_nodes(id) {
				let d = degree.entry(next).or_default();
				*d -= 1;
				if *d == 0 {
					queue.push_back(next);
				}
			}
			if attrs.is_removable(id) {
				continue;
			}
			let key = dag
				.scc(id)
				.nodes
				.iter()
				.filter_map(|&n| dag.graph.value(n).instr())
				.filter_map(|instr| hints.get(&instr).copied())
				.min();
			let stage = match key.and_then(|k| group_stage.get(&k)) {
				Some(&stage) => stage,
				None => {
					partition.stages.push(BTreeSet::new());
					partition.stages.len() - 1
				}
			};
			if let Some(k) = key {
				group_stage.entry(k).or_insert(stage);
			}
			partition.stages[stage].insert(id);
			partition.scc_stage.insert(id, stage);
		}
		partition.validate(dag, attrs)?;
		debug!("partition: {:?}", partition.stages);
		Ok(partition)
	}

	pub fn len(&self) -> usize {
		self.stages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.stages.is_empty()
	}

	pub fn stage_of(&self, id: SccId) -> Option<usize> {
		self.scc_stage.get(&id).copied()
	}

	/// Edges of the stage graph: one per pair of distinct stages where the
	/// later one depends on the earlier, directly or through removable SCCs.
	pub fn stage_edges(&self, dag: &SccDag, attrs: &SccAttrs) -> BTreeSet<(usize, usize)> {
		let mut edges = BTreeSet::new();
		for (&id, &from) in self.scc_stage.iter() {
			for consumer in Self::consumers(dag, attrs, id) {
				if let Some(to) = self.stage_of(consumer) {
					if to != from {
						edges.insert((from, to));
					}
				}
			}
		}
		edges
	}

	/// Non-removable SCCs depending on `id`, looking through removable ones.
	fn consumers(dag: &SccDag, attrs: &SccAttrs, id: SccId) -> BTreeSet<SccId> {
		let mut found = BTreeSet::new();
		let mut seen = BTreeSet::new();
		let mut stack = dag.next_depth_nodes(id);
		while let Some(next) = stack.pop() {
			if !seen.insert(next) {
				continue;
			}
			if attrs.is_removable(next) {
				stack.extend(dag.next_depth_nodes(next));
			} else {
				found.insert(next);
			}
		}
		found
	}

	fn validate(&self, dag: &SccDag, attrs: &SccAttrs) -> Result<()> {
		for id in dag.internal_sccs().filter(|&id| !attrs.is_removable(id)) {
			if self.stage_of(id).is_none() {
				return Err(RrvmError::PartitionError(format!(
					"scc {} has no stage",
					id
				)));
			}
		}
		for (from, to) in self.stage_edges(dag, attrs) {
			if from > to {
				return Err(RrvmError::PartitionError(format!(
					"stage {} feeds the earlier stage {}",
					from, to
				)));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		oracle::BasicAliasAnalysis,
		pdg::{DepKind, DependenceGraph, PdgBuilder, PdgValue},
		sccdag_attrs::DefaultCostModel,
	};
	use rrvm::{dominator::DomTree, samples::*, LlvmFunc};

	fn loop_dag(func: &LlvmFunc, index: usize) -> SccDag {
		let oracle = BasicAliasAnalysis::new(func, false);
		let post_dom = DomTree::new(func, true);
		let graph = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
		let loops = func.loop_analysis();
		SccDag::new(graph.loop_subgraph(func, &loops[index].blocks))
	}

	#[test]
	fn test_every_scc_in_one_stage() {
		let program = pipeline_io(5);
		let func = &program.funcs[0];
		let dag = loop_dag(func, 1);
		let attrs = SccAttrs::new(func, &dag, &DefaultCostModel);
		let partition = Partition::new(&dag, &attrs, &PartitionHints::new()).unwrap();
		assert!(partition.len() >= 2);
		for id in dag.internal_sccs() {
			let owners = partition.stages.iter().filter(|s| s.contains(&id)).count();
			let expected = usize::from(!attrs.is_removable(id));
			assert_eq!(owners, expected);
		}
		for (from, to) in partition.stage_edges(&dag, &attrs) {
			assert!(from < to);
		}
	}

	#[test]
	fn test_hints_group_stages() {
		let program = sum_squares(5);
		let func = &program.funcs[0];
		let dag = loop_dag(func, 1);
		let attrs = SccAttrs::new(func, &dag, &DefaultCostModel);
		let single = Partition::new(&dag, &attrs, &PartitionHints::new()).unwrap();
		// every instruction in one group
		let hints: PartitionHints = func.all_instrs().into_iter().map(|i| (i, 7)).collect();
		let grouped = Partition::new(&dag, &attrs, &hints).unwrap();
		assert!(single.len() > 1);
		assert_eq!(grouped.len(), 1);
	}

	#[test]
	fn test_backward_stage_edge_is_rejected() {
		// a -> b -> c, with a and c grouped
		let mut graph = DependenceGraph::new();
		for i in 0..3 {
			graph.add_node(PdgValue::Instr(InstrId(i)), true);
		}
		graph.add_edge(0, 1, DepKind::Register, true, true);
		graph.add_edge(1, 2, DepKind::Register, true, true);
		let dag = SccDag::new(graph);
		let attrs = SccAttrs {
			info: dag.internal_sccs().map(|id| (id, Default::default())).collect(),
			induction: Default::default(),
		};
		let hints = PartitionHints::from([(InstrId(0), 1), (InstrId(2), 1)]);
		let err = Partition::new(&dag, &attrs, &hints).unwrap_err();
		assert!(matches!(err, RrvmError::PartitionError(_)));
		assert_eq!(Partition::new(&dag, &attrs, &PartitionHints::new()).unwrap().len(), 3);
	}
}
