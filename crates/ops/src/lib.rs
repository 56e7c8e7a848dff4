//! Ferry ops: the stateful half of a migration. Reads Flux resource graphs
//! through an `ObjectStore`, drives each workload through the cutover state
//! machine, and decommissions Flux after a successful batch.

#![forbid(unsafe_code)]

pub mod batch;
pub mod cutover;
pub mod decommission;
pub mod reader;

pub use batch::{migrate_all, scan, BatchOptions, BatchReport, Inventory, WorkloadKind, WorkloadOutcome, WorkloadStatus};
pub use cutover::{
    plan_helm_release, plan_kustomization, Cutover, CutoverError, CutoverPlan, CutoverReport, CutoverState, CutoverStep, SourceObject,
    SourceRole,
};
pub use decommission::{decommission, DecommissionError, DecommissionOptions, DecommissionReport, DecommissionStep, DEFAULT_DECOMMISSION_TIMEOUT};
pub use reader::{ensure_target_controller, read_helm_release, read_kustomization, ReadError};
