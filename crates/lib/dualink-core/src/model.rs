use crate::bucket::TimeMS;

/// A marker trait for model settings. Use this to define the settings for a
/// model. These settings should be readable from a config file.
pub trait ModelSettings: Clone {}

/// A marker trait for models. A model is a struct that contains a behaviour
/// that can be used by an agent or by the bucket.
pub trait Model {
    type Settings: ModelSettings;

    fn with_settings(settings: &Self::Settings) -> Self;
}

/// A trait for models that are owned by the bucket and updated once per step,
/// before the agents are stepped.
pub trait BucketModel {
    /// Initialize the model, called once at the beginning of the simulation.
    fn init(&mut self, step: TimeMS);

    /// Prepare the model before the agents are stepped.
    fn before_agent_step(&mut self, step: TimeMS);
}
