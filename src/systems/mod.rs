//! Application systems
//!
//! Systems that drive a loaded level from the binary

mod simulation;

pub use simulation::{FrameStats, SimulationReport, SimulationSystem};
