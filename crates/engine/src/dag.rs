//! DAG validation and linearization, backed by `petgraph`.

use orchestrator_common::error::{Error, Result};
use orchestrator_common::types::{Dag, DeviceId};
use orchestrator_core::dag::{DagModel, DagValidation};
use petgraph::{
    algo::is_cyclic_directed,
    graph::{DiGraph, NodeIndex},
    visit::Topo,
    Direction,
};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{instrument, warn};

/// Structural validator and linearizer for submitted pipelines.
pub struct PetgraphDagModel {
    max_depth: usize,
}

impl PetgraphDagModel {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn build_graph(&self, dag: &Dag) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for id in dag.stages.keys() {
            let idx = graph.add_node(id.clone());
            node_map.insert(id.clone(), idx);
        }

        for (id, stage) in &dag.stages {
            let Some(&from_idx) = node_map.get(id) else { continue };
            for succ in &stage.succ {
                if let Some(&to_idx) = node_map.get(succ) {
                    graph.add_edge(from_idx, to_idx, ());
                }
            }
        }

        (graph, node_map)
    }

    fn calculate_depth(&self, graph: &DiGraph<String, ()>, node_map: &HashMap<String, NodeIndex>, dag: &Dag) -> usize {
        let mut max_depth = 0;
        let mut depths: HashMap<NodeIndex, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for start in &dag.start {
            if let Some(&idx) = node_map.get(start) {
                queue.push_back((idx, 0usize));
                depths.insert(idx, 0);
            }
        }

        while let Some((node, depth)) = queue.pop_front() {
            max_depth = max_depth.max(depth);
            for edge in graph.edges_directed(node, Direction::Outgoing) {
                let target = edge.target();
                let new_depth = depth + 1;
                if !depths.contains_key(&target) || depths[&target] < new_depth {
                    depths.insert(target, new_depth);
                    queue.push_back((target, new_depth));
                }
            }
        }

        max_depth
    }

    /// Every `(parent, child)` edge whose parent output type doesn't
    /// match the child's declared input type.
    fn find_type_mismatches(&self, dag: &Dag) -> Vec<String> {
        let mut mismatches = Vec::new();
        for (id, stage) in &dag.stages {
            for succ_id in &stage.succ {
                let Some(succ) = dag.stages.get(succ_id) else { continue };
                let output = &stage.service.binding.output;
                let input = &succ.service.binding.input;
                if output != input {
                    mismatches.push(format!("{id} -> {succ_id}: output {output} != input {input}"));
                }
            }
        }
        mismatches
    }

    fn find_unreachable(&self, graph: &DiGraph<String, ()>, node_map: &HashMap<String, NodeIndex>, dag: &Dag) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeIndex> = dag.start.iter().filter_map(|s| node_map.get(s)).copied().collect();

        while let Some(node) = stack.pop() {
            if visited.insert(node) {
                for edge in graph.edges_directed(node, Direction::Outgoing) {
                    stack.push(edge.target());
                }
            }
        }

        graph
            .node_indices()
            .filter(|n| !visited.contains(n))
            .filter_map(|n| graph.node_weight(n).cloned())
            .collect()
    }
}

impl DagModel for PetgraphDagModel {
    #[instrument(skip(self, dag))]
    fn validate(&self, dag: &Dag) -> DagValidation {
        let (graph, node_map) = self.build_graph(dag);

        let has_cycles = is_cyclic_directed(&graph);
        let unreachable = self.find_unreachable(&graph, &node_map, dag);
        let depth = self.calculate_depth(&graph, &node_map, dag);
        let type_mismatches = self.find_type_mismatches(dag);

        if !unreachable.is_empty() {
            warn!(count = unreachable.len(), "dag has unreachable stages");
        }
        if !type_mismatches.is_empty() {
            warn!(count = type_mismatches.len(), "dag has edge type mismatches");
        }

        let valid = !has_cycles && unreachable.is_empty() && depth <= self.max_depth && type_mismatches.is_empty();

        DagValidation {
            valid,
            has_cycles,
            unreachable,
            depth,
            type_mismatches,
        }
    }

    fn topological_order(&self, dag: &Dag) -> Result<Vec<String>> {
        let (graph, _) = self.build_graph(dag);

        if is_cyclic_directed(&graph) {
            return Err(Error::Validation("dag contains a cycle".to_string()));
        }

        let mut result = Vec::new();
        let mut topo = Topo::new(&graph);
        while let Some(idx) = topo.next(&graph) {
            if let Some(id) = graph.node_weight(idx) {
                result.push(id.clone());
            }
        }
        Ok(result)
    }

    fn extract_pipeline(&self, dag: &Dag) -> Result<Vec<String>> {
        let order = self.topological_order(dag)?;

        for id in &order {
            let stage = dag
                .stages
                .get(id)
                .ok_or_else(|| Error::Validation(format!("dangling stage reference: {id}")))?;
            if stage.succ.len() > 1 || stage.prev.len() > 1 {
                return Err(Error::NotAChain(format!(
                    "stage {id} has {} successor(s) and {} predecessor(s)",
                    stage.succ.len(),
                    stage.prev.len()
                )));
            }
        }

        Ok(order)
    }

    fn extract_dag_from_pipeline(&self, template: &Dag, placements: &HashMap<String, DeviceId>) -> Dag {
        let mut dag = template.clone();
        for (stage_id, stage) in &mut dag.stages {
            if let Some(device) = placements.get(stage_id) {
                stage.service.execute_device = device.clone();
            }
        }
        dag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_common::types::{Service, ServiceBinding, Stage};

    fn binding(name: &str, input: &str, output: &str) -> ServiceBinding {
        ServiceBinding {
            name: name.to_string(),
            input: input.to_string(),
            output: output.to_string(),
        }
    }

    fn chain_dag() -> Dag {
        let mut dag = Dag::new();
        dag.add_stage(Stage {
            id: "decode".to_string(),
            prev: vec![],
            succ: vec!["infer".to_string()],
            service: Service::new(binding("decode", "chunk", "frame"), "edge-1".to_string()),
        });
        dag.add_stage(Stage {
            id: "infer".to_string(),
            prev: vec!["decode".to_string()],
            succ: vec![],
            service: Service::new(binding("infer", "frame", "result"), "edge-1".to_string()),
        });
        dag.start = vec!["decode".to_string()];
        dag
    }

    #[test]
    fn validates_a_simple_chain() {
        let model = PetgraphDagModel::new(10);
        let validation = model.validate(&chain_dag());
        assert!(validation.valid);
        assert!(!validation.has_cycles);
        assert!(validation.unreachable.is_empty());
        assert_eq!(validation.depth, 1);
    }

    #[test]
    fn detects_cycles() {
        let mut dag = chain_dag();
        dag.stages.get_mut("infer").unwrap().succ.push("decode".to_string());
        dag.stages.get_mut("decode").unwrap().prev.push("infer".to_string());

        let model = PetgraphDagModel::new(10);
        let validation = model.validate(&dag);
        assert!(validation.has_cycles);
        assert!(!validation.valid);
    }

    #[test]
    fn rejects_branching_as_not_a_chain() {
        let mut dag = chain_dag();
        dag.add_stage(Stage {
            id: "infer2".to_string(),
            prev: vec!["decode".to_string()],
            succ: vec![],
            service: Service::new(binding("infer2", "frame", "result"), "edge-1".to_string()),
        });
        dag.stages.get_mut("decode").unwrap().succ.push("infer2".to_string());

        let model = PetgraphDagModel::new(10);
        let err = model.extract_pipeline(&dag).unwrap_err();
        assert!(matches!(err, Error::NotAChain(_)));
    }

    #[test]
    fn detects_edge_type_mismatch() {
        let mut dag = chain_dag();
        dag.stages.get_mut("infer").unwrap().service.binding.input = "topology".to_string();

        let model = PetgraphDagModel::new(10);
        let validation = model.validate(&dag);
        assert!(!validation.valid);
        assert_eq!(validation.type_mismatches.len(), 1);
        assert!(validation.type_mismatches[0].contains("decode -> infer"));
    }

    #[test]
    fn linearizes_a_chain_in_order() {
        let model = PetgraphDagModel::new(10);
        let pipeline = model.extract_pipeline(&chain_dag()).unwrap();
        assert_eq!(pipeline, vec!["decode".to_string(), "infer".to_string()]);
    }

    #[test]
    fn extract_dag_from_pipeline_rebuilds_placements_and_roundtrips() {
        let model = PetgraphDagModel::new(10);
        let template = chain_dag();
        let pipeline = model.extract_pipeline(&template).unwrap();

        let mut placements = HashMap::new();
        placements.insert(pipeline[0].clone(), "edge-1".to_string());
        placements.insert(pipeline[1].clone(), "cloud".to_string());

        let placed = model.extract_dag_from_pipeline(&template, &placements);
        assert_eq!(placed.stages["decode"].service.execute_device, "edge-1");
        assert_eq!(placed.stages["infer"].service.execute_device, "cloud");
        // Structure is untouched: linearizing the placed dag gives the same chain.
        assert_eq!(model.extract_pipeline(&placed).unwrap(), pipeline);
    }
}
