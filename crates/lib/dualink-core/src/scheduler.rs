use indexmap::IndexMap;
use log::debug;
use typed_builder::TypedBuilder;

use crate::agent::{Agent, AgentId};
use crate::bucket::{Bucket, TimeMS};

/// Drives the simulation clock. Agents are kept in an [IndexMap] sorted by
/// their ID and stepped in that order at every time step. The shared bucket
/// state is prepared before the agents run and flushed after them.
#[derive(TypedBuilder)]
pub struct Scheduler<A, B>
where
    A: Agent<B>,
    B: Bucket,
{
    pub bucket: B,
    pub agents: IndexMap<AgentId, A>,
    pub duration: TimeMS,
    pub step_size: TimeMS,
    pub output_interval: TimeMS,
    #[builder(default = TimeMS::default())]
    pub now: TimeMS,
    #[builder(default = TimeMS::default())]
    pub output_step: TimeMS,
}

impl<A, B> Scheduler<A, B>
where
    A: Agent<B>,
    B: Bucket,
{
    pub fn duration(&self) -> TimeMS {
        self.duration
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn initialize(&mut self) {
        self.agents.sort_unstable_keys();
        for agent_id in self.agents.keys() {
            debug!("Adding agent {} to the scheduler", agent_id);
        }
        self.bucket.initialize(self.now);
    }

    /// Advance the simulation by one step and return the new time.
    pub fn trigger(&mut self) -> TimeMS {
        self.bucket.before_agents(self.now);

        self.agents
            .values_mut()
            .for_each(|agent| agent.step(&mut self.bucket));

        self.bucket.after_agents();

        if self.now == self.output_step {
            self.bucket.stream_output();
            self.output_step += self.output_interval;
        }

        self.now += self.step_size;
        self.now
    }

    pub fn terminate(self) {
        self.bucket.terminate();
    }
}

/// Run the step loop to completion.
pub fn run_simulation<A, B>(mut scheduler: Scheduler<A, B>)
where
    A: Agent<B>,
    B: Bucket,
{
    let end_time = scheduler.duration().as_u64();
    let mut now = 0;
    scheduler.initialize();
    while now < end_time {
        now = scheduler.trigger().as_u64();
    }
    scheduler.terminate();
}
