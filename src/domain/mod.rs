// Domain layer - Core data shapes shared by every other layer
pub mod anomaly;
pub mod annotation;
pub mod case;
pub mod error;
pub mod intervention;
pub mod signal;
