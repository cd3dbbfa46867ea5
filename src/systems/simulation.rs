//! Fixed-step level simulation
//!
//! Each frame:
//! - Updates every updateable object
//! - Builds the depth-sorted draw list
//! - Records per-frame counters

use flatland_core::{Level, QueryStats};

/// Counters for one simulation frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Level frame number after the update
    pub frame: u64,
    /// Live objects at the end of the frame
    pub objects: usize,
    /// Draw commands produced
    pub draw_commands: usize,
}

/// Summary of a whole run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationReport {
    pub frames: u32,
    /// Most objects alive at the end of any frame
    pub peak_objects: usize,
    /// Objects alive when the run ended
    pub final_objects: usize,
    pub draw_commands: usize,
    /// Collision query counters accumulated during the run
    pub queries: QueryStats,
}

/// Steps a level with a fixed timestep
pub struct SimulationSystem {
    timestep: f32,
}

impl SimulationSystem {
    /// Create a simulation system stepping `timestep` seconds per frame
    ///
    /// Non-positive timesteps fall back to 1/60s.
    pub fn new(timestep: f32) -> Self {
        let timestep = if timestep > 0.0 {
            timestep
        } else {
            log::warn!("Invalid timestep {}, using 1/60s", timestep);
            1.0 / 60.0
        };
        Self { timestep }
    }

    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    /// Run one simulation frame
    pub fn step(&mut self, level: &mut Level) -> FrameStats {
        level.update(self.timestep);
        let draw_commands = level.draw().len();
        let stats = FrameStats {
            frame: level.frame(),
            objects: level.data().len(),
            draw_commands,
        };
        log::trace!("Frame {}: {:?}", stats.frame, stats);
        stats
    }

    /// Run `frames` frames and summarise them
    pub fn run(&mut self, level: &mut Level, frames: u32) -> SimulationReport {
        level.query_mut().reset_stats();
        let mut report = SimulationReport {
            final_objects: level.data().len(),
            peak_objects: level.data().len(),
            ..SimulationReport::default()
        };

        for _ in 0..frames {
            let stats = self.step(level);
            report.frames += 1;
            report.peak_objects = report.peak_objects.max(stats.objects);
            report.final_objects = stats.objects;
            report.draw_commands = stats.draw_commands;
        }

        report.queries = level.query().stats();
        log::debug!(
            "Simulated {} frames of '{}' ({} objects left)",
            report.frames,
            level.name(),
            report.final_objects
        );
        report
    }
}

impl Default for SimulationSystem {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}
