use log::error;
use rand::Rng;
use rand_pcg::Pcg64Mcg;
use serde::Deserialize;

use dualink_core::agent::AgentId;
use dualink_core::policy::{ActionCode, Observation, Policy, Reward};

#[derive(Deserialize, Debug, Clone)]
pub struct PolicySettings {
    pub variant: String,
    pub seed: Option<u64>,
    pub actions: Option<Vec<u8>>,
}

/// The policies the simulator can run without an external learner attached.
/// The random baseline is the ablation reference for trained agents; the
/// sequence policy replays a fixed action cycle for deterministic scenarios.
#[derive(Debug)]
pub enum PolicyType {
    Random(RandomPolicy),
    Sequence(SequencePolicy),
}

impl PolicyType {
    pub fn with_settings(settings: &PolicySettings) -> Self {
        match settings.variant.to_lowercase().as_str() {
            "random" => PolicyType::Random(RandomPolicy::new(settings.seed.unwrap_or(0))),
            "sequence" => {
                let actions = settings.actions.clone().unwrap_or_else(|| {
                    error!("Missing actions for the sequence policy, using no-op.");
                    vec![8]
                });
                PolicyType::Sequence(SequencePolicy::new(actions))
            }
            _ => {
                error!("Only random and sequence policy variants are supported.");
                panic!("Unsupported policy variant {}.", settings.variant);
            }
        }
    }
}

impl Policy for PolicyType {
    fn select_action(&mut self, agent_id: AgentId, observation: &Observation) -> ActionCode {
        match self {
            PolicyType::Random(policy) => policy.select_action(agent_id, observation),
            PolicyType::Sequence(policy) => policy.select_action(agent_id, observation),
        }
    }

    fn observe(
        &mut self,
        agent_id: AgentId,
        observation: &Observation,
        action: ActionCode,
        reward: Reward,
        next_observation: &Observation,
    ) {
        match self {
            PolicyType::Random(policy) => {
                policy.observe(agent_id, observation, action, reward, next_observation)
            }
            PolicyType::Sequence(policy) => {
                policy.observe(agent_id, observation, action, reward, next_observation)
            }
        }
    }
}

/// Uniformly random action selection. Learns nothing; transitions are
/// accepted and dropped.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: Pcg64Mcg,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64Mcg::new(seed as u128),
        }
    }
}

impl Policy for RandomPolicy {
    fn select_action(&mut self, _agent_id: AgentId, _observation: &Observation) -> ActionCode {
        ActionCode::new(self.rng.gen_range(ActionCode::MIN..=ActionCode::MAX))
    }

    fn observe(
        &mut self,
        _agent_id: AgentId,
        _observation: &Observation,
        _action: ActionCode,
        _reward: Reward,
        _next_observation: &Observation,
    ) {
    }
}

/// Replays a fixed cycle of action codes, one per query.
#[derive(Debug, Clone)]
pub struct SequencePolicy {
    actions: Vec<ActionCode>,
    cursor: usize,
}

impl SequencePolicy {
    pub fn new(actions: Vec<u8>) -> Self {
        let actions = if actions.is_empty() {
            vec![ActionCode::new(8)]
        } else {
            actions.into_iter().map(ActionCode::new).collect()
        };
        Self { actions, cursor: 0 }
    }
}

impl Policy for SequencePolicy {
    fn select_action(&mut self, _agent_id: AgentId, _observation: &Observation) -> ActionCode {
        let action = self.actions[self.cursor % self.actions.len()];
        self.cursor += 1;
        action
    }

    fn observe(
        &mut self,
        _agent_id: AgentId,
        _observation: &Observation,
        _action: ActionCode,
        _reward: Reward,
        _next_observation: &Observation,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_policy_emits_valid_actions() {
        let mut policy = RandomPolicy::new(17);
        let observation = Observation::default();
        for _ in 0..200 {
            let action = policy.select_action(AgentId::from(1), &observation);
            assert!((ActionCode::MIN..=ActionCode::MAX).contains(&action.as_u8()));
        }
    }

    #[test]
    fn sequence_policy_cycles() {
        let mut policy = SequencePolicy::new(vec![1, 8]);
        let observation = Observation::default();
        let codes: Vec<u8> = (0..4)
            .map(|_| policy.select_action(AgentId::from(1), &observation).as_u8())
            .collect();
        assert_eq!(codes, vec![1, 8, 1, 8]);
    }
}
