//! Invariant checks that the database cannot express on its own.

use crate::{
    store::{Step, Transition},
    Error, Result,
};

pub const MAX_NAME_LENGTH: usize = 255;

/// Trimmed `name`, or a validation error when it is blank or too long.
pub fn validate_name(kind: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} name must not be empty", kind)));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "{} name must be at most {} characters",
            kind, MAX_NAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Both endpoints of a transition must belong to the transition's workflow.
pub fn ensure_transition_scoped(workflow_id: i64, from_step: &Step, to_step: &Step) -> Result<()> {
    if from_step.workflow_id != workflow_id || to_step.workflow_id != workflow_id {
        return Err(Error::Domain(
            "Both steps must belong to the same workflow.".to_string(),
        ));
    }
    Ok(())
}

/// A product workflow may only point at a step of its own workflow.
pub fn ensure_step_in_workflow(workflow_id: i64, step: &Step) -> Result<()> {
    if step.workflow_id != workflow_id {
        return Err(Error::Domain(format!(
            "Step {} belongs to workflow {}, not to workflow {}.",
            step.id, step.workflow_id, workflow_id
        )));
    }
    Ok(())
}

/// Checks an already stored transition, e.g. one loaded for display.
pub fn transition_is_consistent(transition: &Transition, from_step: &Step, to_step: &Step) -> bool {
    transition.from_step_id == from_step.id
        && transition.to_step_id == to_step.id
        && ensure_transition_scoped(transition.workflow_id, from_step, to_step).is_ok()
}
