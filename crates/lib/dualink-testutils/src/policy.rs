use dualink_core::agent::AgentId;
use dualink_core::policy::{ActionCode, Observation, Policy, Reward};

/// A transition the scripted policy has been shown, kept for assertions.
#[derive(Clone, Debug)]
pub struct SeenTransition {
    pub agent_id: AgentId,
    pub action: ActionCode,
    pub reward: Reward,
    pub observation: Observation,
    pub next_observation: Observation,
}

/// A deterministic policy stand-in that replays a fixed action script and
/// records every transition it observes. The last script entry repeats once
/// the script is exhausted.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPolicy {
    script: Vec<ActionCode>,
    cursor: usize,
    pub transitions: Vec<SeenTransition>,
}

impl ScriptedPolicy {
    pub fn new(script: Vec<u8>) -> Self {
        Self {
            script: script.into_iter().map(ActionCode::new).collect(),
            cursor: 0,
            transitions: Vec::new(),
        }
    }

    pub fn always(action: u8) -> Self {
        Self::new(vec![action])
    }
}

impl Policy for ScriptedPolicy {
    fn select_action(&mut self, _agent_id: AgentId, _observation: &Observation) -> ActionCode {
        if self.script.is_empty() {
            return ActionCode::new(8);
        }
        let action = self.script[self.cursor.min(self.script.len() - 1)];
        self.cursor += 1;
        action
    }

    fn observe(
        &mut self,
        agent_id: AgentId,
        observation: &Observation,
        action: ActionCode,
        reward: Reward,
        next_observation: &Observation,
    ) {
        self.transitions.push(SeenTransition {
            agent_id,
            action,
            reward,
            observation: *observation,
            next_observation: *next_observation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_replays_and_repeats_last_action() {
        let mut policy = ScriptedPolicy::new(vec![1, 3, 8]);
        let observation = Observation::default();
        let codes: Vec<u8> = (0..5)
            .map(|_| policy.select_action(AgentId::from(1), &observation).as_u8())
            .collect();
        assert_eq!(codes, vec![1, 3, 8, 8, 8]);
    }

    #[test]
    fn transitions_are_recorded() {
        let mut policy = ScriptedPolicy::always(8);
        let observation = Observation::default();
        policy.observe(
            AgentId::from(2),
            &observation,
            ActionCode::new(8),
            Reward::new(0.25),
            &observation,
        );
        assert_eq!(policy.transitions.len(), 1);
        assert_eq!(policy.transitions[0].agent_id, AgentId::from(2));
        assert_eq!(policy.transitions[0].reward, Reward::new(0.25));
    }
}
