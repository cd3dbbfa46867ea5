//! Renderer seam
//!
//! Drawing itself happens outside this crate. Objects describe themselves as
//! [`DrawCommand`]s recorded into a [`DrawList`], which a backend consumes.

use flatland_math::{Aabb2, Vec2};
use flatland_physics::ObjectId;

use crate::level_data::LevelData;
use crate::object::Capabilities;

/// One primitive emitted by an object
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCommand {
    Line {
        object: Option<ObjectId>,
        depth: i32,
        start: Vec2,
        end: Vec2,
    },
    Ellipse {
        object: Option<ObjectId>,
        depth: i32,
        center: Vec2,
        radii: Vec2,
        rotation: f32,
    },
    Rect {
        object: Option<ObjectId>,
        depth: i32,
        bounds: Aabb2,
    },
}

impl DrawCommand {
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            DrawCommand::Line { object, .. }
            | DrawCommand::Ellipse { object, .. }
            | DrawCommand::Rect { object, .. } => *object,
        }
    }

    pub fn depth(&self) -> i32 {
        match self {
            DrawCommand::Line { depth, .. }
            | DrawCommand::Ellipse { depth, .. }
            | DrawCommand::Rect { depth, .. } => *depth,
        }
    }
}

/// Recorder for one frame's draw commands
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

/// Turns the renderable objects of a level into draw commands
pub trait Renderer {
    /// Record a frame into `out`
    ///
    /// Implementations must lock `data` around their iteration.
    fn draw(&mut self, data: &mut LevelData, out: &mut DrawList);
}

/// Draws renderables by ascending depth, then ascending id
#[derive(Debug, Default)]
pub struct DepthSortedRenderer {
    order: Vec<(i32, ObjectId)>,
}

impl DepthSortedRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for DepthSortedRenderer {
    fn draw(&mut self, data: &mut LevelData, out: &mut DrawList) {
        data.lock();

        self.order.clear();
        self.order.extend(
            data.objects_with(Capabilities::RENDERABLE)
                .map(|(id, object)| (object.core().depth, id)),
        );
        self.order.sort_unstable();

        for (_, id) in &self.order {
            if let Some(object) = data.get(*id) {
                object.draw(out);
            }
        }

        data.unlock();
    }
}
