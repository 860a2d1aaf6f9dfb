use log::error;
use rand::Rng;
use rand_distr::{Binomial, Distribution, LogNormal, Normal, Uniform};
use rand_pcg::Pcg64Mcg;
use serde::Deserialize;

#[derive(Debug, Clone, Copy)]
pub enum DistType {
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
}

/// All the distribution parameters are optional, but the ones required by the
/// chosen variant must be present. Name of the variant is mandatory.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Deserialize)]
pub struct DistParams {
    pub dist_name: String,
    pub seed: Option<u64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl DistType {
    pub fn new(params: &DistParams) -> Self {
        match params.dist_name.to_lowercase().as_str() {
            "uniform" => match Self::build_uniform(params) {
                Ok(dist) => dist,
                Err(_) => panic!("Invalid uniform distribution parameters"),
            },
            "normal" => match Self::build_normal(params) {
                Ok(dist) => dist,
                Err(_) => panic!("Invalid normal distribution parameters"),
            },
            "lognormal" => match Self::build_log_normal(params) {
                Ok(dist) => dist,
                Err(_) => panic!("Invalid lognormal distribution parameters"),
            },
            _ => {
                error!(
                    "Only uniform, normal and lognormal distributions are supported."
                );
                panic!("Unsupported distribution {}.", params.dist_name);
            }
        }
    }

    fn build_uniform(params: &DistParams) -> Result<Self, Box<dyn std::error::Error>> {
        let min = params.min.ok_or("Missing min")?;
        let max = params.max.ok_or("Missing max")?;
        Ok(Self::Uniform(Uniform::new(min, max)))
    }

    fn build_normal(params: &DistParams) -> Result<Self, Box<dyn std::error::Error>> {
        let mean = params.mean.ok_or("Missing mean")?;
        let std_dev = params.std_dev.ok_or("Missing std_dev")?;
        Ok(Self::Normal(Normal::new(mean, std_dev)?))
    }

    fn build_log_normal(params: &DistParams) -> Result<Self, Box<dyn std::error::Error>> {
        let mean = params.mean.ok_or("Missing mean")?;
        let std_dev = params.std_dev.ok_or("Missing std_dev")?;
        Ok(Self::LogNormal(LogNormal::new(mean, std_dev)?))
    }
}

#[derive(Debug, Clone)]
pub struct RngSampler {
    pub dist: DistType,
    pub rng: Pcg64Mcg,
}

impl RngSampler {
    pub fn new(params: &DistParams) -> Self {
        let seed: u128 = params.seed.unwrap_or(0) as u128;
        let dist = DistType::new(params);
        Self {
            dist,
            rng: Pcg64Mcg::new(seed),
        }
    }

    pub fn sample(&mut self) -> f64 {
        match self.dist {
            DistType::Uniform(ref dist) => dist.sample(&mut self.rng),
            DistType::Normal(ref dist) => dist.sample(&mut self.rng),
            DistType::LogNormal(ref dist) => dist.sample(&mut self.rng),
        }
    }
}

/// Draw the number of successes out of <code>trials</code> attempts, each
/// succeeding with probability <code>p</code>. Out-of-range probabilities are
/// clamped so that callers can feed raw step-table outputs directly.
pub fn binomial_draw<R: Rng>(rng: &mut R, trials: u64, p: f64) -> u64 {
    if trials == 0 {
        return 0;
    }
    let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    match Binomial::new(trials, p) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 0,
    }
}

/// Draw a zero-mean Gaussian with the given standard deviation.
pub fn zero_mean_gaussian<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    match Normal::new(0.0, sigma) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binomial_draw_is_bounded() {
        let mut rng = Pcg64Mcg::new(7);
        for _ in 0..100 {
            let successes = binomial_draw(&mut rng, 10, 0.5);
            assert!(successes <= 10);
        }
    }

    #[test]
    fn binomial_draw_clamps_probability() {
        let mut rng = Pcg64Mcg::new(7);
        assert_eq!(binomial_draw(&mut rng, 10, 1.7), 10);
        assert_eq!(binomial_draw(&mut rng, 10, -0.3), 0);
        assert_eq!(binomial_draw(&mut rng, 10, f64::NAN), 0);
    }

    #[test]
    fn uniform_sampler_stays_in_range() {
        let params = DistParams {
            dist_name: "uniform".to_string(),
            seed: Some(11),
            mean: None,
            std_dev: None,
            min: Some(5.0),
            max: Some(10.0),
        };
        let mut sampler = RngSampler::new(&params);
        for _ in 0..50 {
            let value = sampler.sample();
            assert!((5.0..10.0).contains(&value));
        }
    }
}
