//! DAG model contract: validation, topological ordering, and the
//! chain-only pipeline linearization used by the AIMD scheduler.

use orchestrator_common::error::Result;
use orchestrator_common::types::{Dag, DeviceId};
use std::collections::HashMap;

/// Outcome of validating a submitted DAG.
#[derive(Debug, Clone, Default)]
pub struct DagValidation {
    pub valid: bool,
    pub has_cycles: bool,
    pub unreachable: Vec<String>,
    pub depth: usize,
    /// One reason string per edge whose parent output type doesn't
    /// match its child's input type, e.g. `"decode -> infer: output
    /// frame != input topology"`.
    pub type_mismatches: Vec<String>,
}

/// Validates submitted DAGs, orders their stages, and linearizes them
/// into the single edge-to-cloud chain the AIMD scheduler operates on.
pub trait DagModel: Send + Sync {
    /// Structural validation: acyclicity, reachability from `dag.start`,
    /// and that every edge's parent output type matches the child's
    /// input type.
    fn validate(&self, dag: &Dag) -> DagValidation;

    /// A topological order over `dag`'s stages. Fails if the graph is
    /// cyclic.
    fn topological_order(&self, dag: &Dag) -> Result<Vec<String>>;

    /// Linearizes `dag` into a single ordered chain of stage ids. Fails
    /// with `Error::NotAChain` if any stage has more than one successor
    /// or predecessor.
    fn extract_pipeline(&self, dag: &Dag) -> Result<Vec<String>>;

    /// The inverse of `extract_pipeline`: rebuilds a deployable `Dag`
    /// from `template` (which supplies every stage's structure and
    /// service binding) by stamping each stage's `execute_device` from
    /// `placements`, leaving stages absent from `placements` on their
    /// current device.
    fn extract_dag_from_pipeline(&self, template: &Dag, placements: &HashMap<String, DeviceId>) -> Dag;
}
