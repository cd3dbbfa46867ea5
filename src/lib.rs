//! Flatland - 2D level simulation
//!
//! Loads a level file, steps its objects with a fixed timestep and
//! reports what happened.

pub mod config;
pub mod systems;
