//! Draw commands submitted to a window through `push_draw_command`.

use alloc::string::String;
use alloc::vec::Vec;

use crate::types::FontId;

/// RGBA color, 8 bits per channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub position: Vec2,
    pub size: Vec2,
}

impl Bounds {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.position.x
            && point.y >= self.position.y
            && point.x < self.position.x + self.size.x
            && point.y < self.position.y + self.size.y
    }

    /// Shrink by `amount` on every side, clamping at zero size.
    pub fn inset(&self, amount: f32) -> Self {
        Self {
            position: Vec2::new(self.position.x + amount, self.position.y + amount),
            size: Vec2::new(
                (self.size.x - 2.0 * amount).max(0.0),
                (self.size.y - 2.0 * amount).max(0.0),
            ),
        }
    }
}

/// Border stroke; colors are left, right, top, bottom.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub colors: [Color; 4],
    pub width: f32,
}

impl Stroke {
    pub const NONE: Self = Self {
        colors: [Color::TRANSPARENT; 4],
        width: 0.0,
    };

    pub const fn uniform(color: Color, width: f32) -> Self {
        Self {
            colors: [color; 4],
            width,
        }
    }
}

/// Host-side image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureHandle {
    Texture { id: u64 },
    Svg { id: u64, width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture {
    pub color: Color,
    pub handle: TextureHandle,
}

/// One tagged draw command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        bounds: Bounds,
        color: Color,
        stroke: Stroke,
    },
    Texture {
        bounds: Bounds,
        texture: Texture,
        stroke: Stroke,
    },
    Text {
        content: String,
        size: u32,
        color: Color,
        position: Vec2,
        font: FontId,
    },
}

/// Ordered batch of draw commands for one window.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommandPool {
    commands: Vec<DrawCommand>,
}

impl CommandPool {
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

    /// Drop all commands, keeping the allocation for the next frame.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl From<Vec<DrawCommand>> for CommandPool {
    fn from(commands: Vec<DrawCommand>) -> Self {
        Self { commands }
    }
}
