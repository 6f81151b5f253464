enum CallingStack {
	Prepare(usize),
	LoopTree(usize, usize), //low[u]=min(low[u],low[v])
	Back(usize),
}

/// Iterative Tarjan over a graph of `size` nodes numbered from 0.
pub struct Tarjan {
	dfs: Vec<Option<usize>>,
	low: Vec<usize>,
	in_stack: Vec<bool>,
	object_stack: Vec<usize>,
	calling_stack: Vec<CallingStack>,
	next_dfs_order: usize,
}

pub trait Graph {
	fn next(&self, u: usize) -> Box<dyn Iterator<Item = usize> + '_>;
}

impl Tarjan {
	pub fn new(size: usize) -> Self {
		Self {
			dfs: vec![None; size],
			low: vec![0; size],
			in_stack: vec![false; size],
			calling_stack: vec![],
			object_stack: vec![],
			next_dfs_order: 0,
		}
	}

	/// Components in completion order: a component only reaches components
	/// listed before it. The search starts from `seeds` in order, then from
	/// every node still unvisited, so each node lands in exactly one
	/// component.
	pub fn work(mut self, graph: &impl Graph, seeds: &[usize]) -> Vec<Vec<usize>> {
		let mut sccs = vec![];
		let size = self.dfs.len();
		for item in seeds.iter().copied().chain(0..size) {
			if self.dfs[item].is_some() {
				continue;
			}
			self.calling_stack.push(CallingStack::Prepare(item));
			self.main_loop(graph, &mut sccs);
		}
		sccs
	}

	fn main_loop(&mut self, graph: &impl Graph, result: &mut Vec<Vec<usize>>) {
		while let Some(order) = self.calling_stack.pop() {
			match order {
				CallingStack::Prepare(u) => {
					if self.dfs[u].is_some() {
						continue;
					}
					self.dfs[u] = Some(self.next_dfs_order);
					self.low[u] = self.next_dfs_order;
					self.next_dfs_order += 1;
					self.in_stack[u] = true;
					self.object_stack.push(u);
					self.calling_stack.push(CallingStack::Back(u));
					for v in graph.next(u) {
						match self.dfs[v] {
							None => {
								// tree edge
								self.calling_stack.push(CallingStack::LoopTree(u, v));
								self.calling_stack.push(CallingStack::Prepare(v));
							}
							Some(order) if self.in_stack[v] => {
								// back edge
								self.low[u] = self.low[u].min(order);
							}
							Some(_) => {}
						}
					}
				}
				CallingStack::LoopTree(u, v) => {
					if self.in_stack[v] {
						self.low[u] = self.low[u].min(self.low[v]);
					}
				}
				CallingStack::Back(u) => {
					if self.dfs[u] == Some(self.low[u]) {
						let mut scc = vec![];
						while let Some(this) = self.object_stack.pop() {
							self.in_stack[this] = false;
							scc.push(this);
							if this == u {
								break;
							}
						}
						scc.sort_unstable();
						result.push(scc);
					}
				}
			}
		}
		debug_assert!(self.object_stack.is_empty());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Adjacency(Vec<Vec<usize>>);

	impl Graph for Adjacency {
		fn next(&self, u: usize) -> Box<dyn Iterator<Item = usize> + '_> {
			Box::new(self.0[u].iter().copied())
		}
	}

	#[test]
	fn test_two_cycles_and_a_tail() {
		// 0 <-> 1 -> 2 <-> 3 -> 4
		let graph =
			Adjacency(vec![vec![1], vec![0, 2], vec![3], vec![2, 4], vec![]]);
		let sccs = Tarjan::new(5).work(&graph, &[0]);
		assert_eq!(sccs, vec![vec![4], vec![2, 3], vec![0, 1]]);
	}

	#[test]
	fn test_unseeded_nodes_are_covered() {
		let graph = Adjacency(vec![vec![], vec![1], vec![0]]);
		let sccs = Tarjan::new(3).work(&graph, &[]);
		assert_eq!(sccs.len(), 3);
		let mut all: Vec<usize> = sccs.into_iter().flatten().collect();
		all.sort();
		assert_eq!(all, vec![0, 1, 2]);
	}
}
