pub mod graph;
pub mod service;
pub mod validation;

pub use graph::TransitionGraph;
pub use service::{ProductWorkflowDetail, WorkflowService};
