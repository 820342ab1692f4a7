use std::collections::HashMap;

use crate::store::{Step, Transition};

/// Read-only adjacency view over a workflow's steps and transitions.
///
/// Nothing here fires transitions or evaluates conditions; it only answers
/// which edges leave a step and which steps have no way in.
#[derive(Debug, Clone)]
pub struct TransitionGraph {
    /// step_id -> ids of transitions leaving it
    outgoing: HashMap<i64, Vec<i64>>,
    /// step_id -> ids of transitions entering it
    incoming: HashMap<i64, Vec<i64>>,
    /// Steps with no incoming transition, in step order.
    entry_steps: Vec<i64>,
}

impl TransitionGraph {
    /// `steps` are expected in display order; entry steps keep that order.
    pub fn new(steps: &[Step], transitions: &[Transition]) -> Self {
        let mut outgoing: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut incoming: HashMap<i64, Vec<i64>> = HashMap::new();

        for transition in transitions {
            outgoing
                .entry(transition.from_step_id)
                .or_default()
                .push(transition.id);
            incoming
                .entry(transition.to_step_id)
                .or_default()
                .push(transition.id);
        }

        let entry_steps = steps
            .iter()
            .filter(|step| !incoming.contains_key(&step.id))
            .map(|step| step.id)
            .collect();

        Self {
            outgoing,
            incoming,
            entry_steps,
        }
    }

    pub fn entry_steps(&self) -> &[i64] {
        &self.entry_steps
    }

    /// Ids of transitions leaving `step_id`.
    pub fn outgoing(&self, step_id: i64) -> &[i64] {
        self.outgoing
            .get(&step_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of transitions entering `step_id`.
    pub fn incoming(&self, step_id: i64) -> &[i64] {
        self.incoming
            .get(&step_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Transitions leaving `step_id`, resolved against `transitions`.
    pub fn outgoing_transitions<'a>(
        &self,
        step_id: i64,
        transitions: &'a [Transition],
    ) -> Vec<&'a Transition> {
        let ids = self.outgoing(step_id);
        transitions
            .iter()
            .filter(|transition| ids.contains(&transition.id))
            .collect()
    }
}
