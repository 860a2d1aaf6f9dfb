pub mod handover;
pub mod position;
pub mod reward;
pub mod tx;
