use std::fmt;
use std::fmt::Debug;
use std::str::FromStr;

use serde::Deserialize;

use crate::bucket::Bucket;

/// A unique ID that is a property of all the agents in the simulation.
#[derive(Deserialize, Default, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct AgentId(u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>()?;
        Ok(Self(id))
    }
}

impl From<u64> for AgentId {
    fn from(f: u64) -> Self {
        Self(f)
    }
}

impl AgentId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
}

/// The kind of an agent. The simulation currently schedules vehicles only,
/// infrastructure is owned by the bucket.
#[derive(Deserialize, Debug, Hash, Copy, Default, Clone, PartialEq, Eq)]
pub enum AgentKind {
    #[default]
    Vehicle,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Vehicle => write!(f, "Vehicle"),
        }
    }
}

/// An entity that can be scheduled by the simulation. Agents are stepped in
/// ascending [AgentId] order at every time step, which keeps mutations of the
/// shared bucket state sequenced and reproducible.
pub trait Agent<B>: Clone + Send
where
    B: Bucket,
{
    fn id(&self) -> AgentId;
    fn step(&mut self, bucket: &mut B);
}
