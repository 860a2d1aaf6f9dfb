use std::fmt::Display;
use std::ops::{Add, AddAssign, Div, Mul, Sub};
use std::str::FromStr;

use serde::Deserialize;

/// Simulation time in milliseconds. All timers, intervals and windows in the
/// simulation are expressed in this unit.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeMS(pub u64);

impl Display for TimeMS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TimeMS {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.parse::<u64>()?;
        Ok(Self(value))
    }
}

impl From<u64> for TimeMS {
    fn from(f: u64) -> Self {
        Self(f)
    }
}

impl From<i64> for TimeMS {
    fn from(f: i64) -> Self {
        Self(f as u64)
    }
}

impl TimeMS {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1000.0
    }
    pub fn saturating_sub(&self, rhs: TimeMS) -> TimeMS {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Mul for TimeMS {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl Div for TimeMS {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Self(self.0 / rhs.0)
    }
}

impl Add for TimeMS {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeMS {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for TimeMS {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Shared simulation state passed to every agent. The environment models that
/// are common to all agents (cells, clusters, channel, output) live behind a
/// struct implementing this trait.
pub trait Bucket: Send {
    /// Called once before the step loop starts.
    fn initialize(&mut self, step: TimeMS);

    /// Called at the start of every step, before any agent is stepped.
    fn before_agents(&mut self, step: TimeMS);

    /// Called at the end of every step, after all agents are stepped.
    fn after_agents(&mut self);

    /// Flush collected records to the output sink.
    fn stream_output(&mut self);

    /// Consume the bucket at the end of the simulation.
    fn terminate(self);
}
