// Analysis layer - pure signal computations, no I/O
pub mod annotations;
pub mod anomaly;
pub mod downsample;
pub mod moving_average;
pub mod simulation;
pub mod synthetic;
