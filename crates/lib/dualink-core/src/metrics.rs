/// A trait that marks a type as a measured radio quantity. It could be a
/// signal power, a ratio or a rate wrapped in a named type.
pub trait Metric: Default + PartialEq + PartialOrd + Copy + Clone + Send + Sync {}

/// A trait for structs that carry the settings of a metric model. The settings
/// should be readable from a config file.
pub trait MetricSettings {}
