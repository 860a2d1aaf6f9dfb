use std::fmt::Display;
use std::ops::{Add, AddAssign, Sub};

use serde::Deserialize;

use dualink_core::metrics::Metric;

/// A signal power level in dBm.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Dbm(f64);

impl Dbm {
    pub fn new(value: f64) -> Self {
        Self(value)
    }
    pub fn as_f64(&self) -> f64 {
        self.0
    }
    /// Power in milliwatts, for combining signals in the linear domain.
    pub fn as_mw(&self) -> f64 {
        10f64.powf(self.0 / 10.0)
    }
    pub fn from_mw(mw: f64) -> Self {
        Self(10.0 * mw.max(1e-15).log10())
    }
}

impl Display for Dbm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}dBm", self.0)
    }
}

impl From<f64> for Dbm {
    fn from(f: f64) -> Self {
        Self(f)
    }
}

impl Sub for Dbm {
    type Output = Decibel;

    fn sub(self, other: Self) -> Self::Output {
        Decibel::new(self.0 - other.0)
    }
}

impl Metric for Dbm {}

/// A power ratio in dB, used for SINR values and hysteresis margins.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Decibel(f64);

impl Decibel {
    pub fn new(value: f64) -> Self {
        Self(value)
    }
    pub fn as_f64(&self) -> f64 {
        self.0
    }
    pub fn as_linear(&self) -> f64 {
        10f64.powf(self.0 / 10.0)
    }
}

impl Display for Decibel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}dB", self.0)
    }
}

impl From<f64> for Decibel {
    fn from(f: f64) -> Self {
        Self(f)
    }
}

impl Add for Decibel {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self(self.0 + other.0)
    }
}

impl Metric for Decibel {}

/// A data rate in megabits per second. Never negative.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Mbps(f64);

impl Mbps {
    pub fn new(value: f64) -> Self {
        Self(value.max(0.0))
    }
    pub fn as_f64(&self) -> f64 {
        self.0
    }
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl Display for Mbps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}Mbps", self.0)
    }
}

impl Add for Mbps {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Mbps {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Metric for Mbps {}

/// Relative utilization of a cell, clamped to [0, 100].
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct LoadPercent(f64);

impl LoadPercent {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 100.0))
    }
    pub fn as_f64(&self) -> f64 {
        self.0
    }
    pub fn as_fraction(&self) -> f64 {
        self.0 / 100.0
    }
    pub fn add(&mut self, delta: f64) {
        self.0 = (self.0 + delta).clamp(0.0, 100.0);
    }
}

impl Display for LoadPercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Metric for LoadPercent {}

/// A one-way delay in seconds.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Latency(f64);

impl Latency {
    pub fn new(value: f64) -> Self {
        Self(value.max(0.0))
    }
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl Display for Latency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}s", self.0)
    }
}

impl Metric for Latency {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_is_clamped() {
        let mut load = LoadPercent::new(150.0);
        assert_eq!(load.as_f64(), 100.0);
        load.add(-250.0);
        assert_eq!(load.as_f64(), 0.0);
        load.add(42.5);
        assert_eq!(load.as_f64(), 42.5);
    }

    #[test]
    fn dbm_linear_round_trip() {
        let power = Dbm::new(-90.0);
        let back = Dbm::from_mw(power.as_mw());
        assert!((power.as_f64() - back.as_f64()).abs() < 1e-9);
    }
}
