use llvm::{LoadInstr, StoreInstr, Temp, Value};
use rrvm::{LlvmFunc, LlvmGen};

use crate::{pdg::PdgValue, sccdag::SccDag};

/// Layout of the array carrying values across the boundary of a
/// parallelized loop: one slot per live-in, then one per live-out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvInfo {
	pub live_ins: Vec<Temp>,
	pub live_outs: Vec<Temp>,
}

impl EnvInfo {
	/// Reads the live values off the external pseudo-SCCs of a loop.
	pub fn new(func: &LlvmFunc, dag: &SccDag) -> Self {
		let graph = &dag.graph;
		let temp_of = |value: &PdgValue| match value {
			PdgValue::Param(t) => Some(t.clone()),
			PdgValue::Instr(id) => func.instr(*id).get_write(),
		};
		let mut env = Self::default();
		for id in dag.external_sccs() {
			for &node in dag.scc(id).nodes.iter() {
				if graph.outgoing(node).any(|e| graph.is_internal(e.to)) {
					env.live_ins.extend(temp_of(graph.value(node)));
				}
				for edge in graph.incoming(node) {
					if graph.is_internal(edge.from) {
						env.live_outs.extend(temp_of(graph.value(edge.from)));
					}
				}
			}
		}
		env.live_ins.sort();
		env.live_ins.dedup();
		env.live_outs.sort();
		env.live_outs.dedup();
		env
	}

	pub fn len(&self) -> usize {
		self.live_ins.len() + self.live_outs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn live_in_slot(&self, temp: &Temp) -> Option<usize> {
		self.live_ins.iter().position(|t| t == temp)
	}

	pub fn live_out_slot(&self, temp: &Temp) -> Option<usize> {
		let offset = self.live_ins.len();
		self.live_outs.iter().position(|t| t == temp).map(|i| offset + i)
	}

	pub fn live_out_slots(&self) -> impl Iterator<Item = (usize, &Temp)> {
		let offset = self.live_ins.len();
		self.live_outs.iter().enumerate().map(move |(i, t)| (offset + i, t))
	}

	/// Defines `temp` in the generated function from its slot.
	pub fn load_live_in(&self, gen: &mut LlvmGen, env: &Temp, temp: &Temp) {
		let Some(slot) = self.live_in_slot(temp) else {
			return;
		};
		let addr = gen.visit_gep_instr(env.into(), (slot as i32).into());
		gen.emit(LoadInstr {
			target: temp.clone(),
			var_type: temp.var_type,
			addr: addr.into(),
		});
	}

	pub fn store_live_out(&self, gen: &mut LlvmGen, env: &Temp, temp: &Temp) {
		self.store_value(gen, env, temp, Value::from(temp));
	}

	/// Stores `value` into the slot of the live-out `temp`.
	pub fn store_value(
		&self,
		gen: &mut LlvmGen,
		env: &Temp,
		temp: &Temp,
		value: Value,
	) {
		let Some(slot) = self.live_out_slot(temp) else {
			return;
		};
		let addr = gen.visit_gep_instr(env.into(), (slot as i32).into());
		gen.emit(StoreInstr {
			value,
			addr: addr.into(),
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{oracle::BasicAliasAnalysis, pdg::PdgBuilder};
	use rrvm::{dominator::DomTree, samples::*};

	fn env_of(func: &LlvmFunc, index: usize) -> EnvInfo {
		let oracle = BasicAliasAnalysis::new(func, false);
		let post_dom = DomTree::new(func, true);
		let graph = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
		let loops = func.loop_analysis();
		let dag = SccDag::new(graph.loop_subgraph(func, &loops[index].blocks));
		EnvInfo::new(func, &dag)
	}

	fn names(temps: &[Temp]) -> Vec<&str> {
		temps.iter().map(|t| t.name.as_str()).collect()
	}

	#[test]
	fn test_parameters_are_live_ins() {
		let program = param_scale(10);
		let func = program.get_func("scale").unwrap();
		let env = env_of(func, 0);
		assert_eq!(names(&env.live_ins), vec!["n", "pa.arg", "pb.arg"]);
		assert!(env.live_outs.is_empty());
		assert_eq!(env.live_in_slot(&func.params[2]), Some(0));
	}

	#[test]
	fn test_reduction_is_live_out() {
		let program = sum_squares(10);
		let func = &program.funcs[0];
		let env = env_of(func, 1);
		assert_eq!(names(&env.live_outs), vec!["s"]);
		assert_eq!(names(&env.live_ins), vec!["a"]);
		assert_eq!(env.live_out_slot(&env.live_outs[0]), Some(1));
		assert_eq!(env.len(), 2);
	}
}
