//! Render-state plumbing shared by every draw path.
//!
//! The [`Renderer`] owns a [`RenderBackend`], the matrix stacks and the
//! state-rollback tracker. Any mutator on the renderer records the previous
//! backend value in the innermost open scope before changing it, so popping
//! a scope puts the backend back exactly as it was when the scope opened.

mod backend;
mod matrix;
mod null;
mod renderer;
mod state;

pub use backend::RenderBackend;
pub use matrix::{Matrices, MatrixMode, MatrixStack, MATRIX_STACK_CAPACITY};
pub use null::NullBackend;
pub use renderer::{Renderer, StateScope};
pub use state::{DirtyBits, RenderStateTracker, RollbackFrame, STATE_STACK_CAPACITY};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Number of texture units tracked by the rollback stack.
pub const TEXTURE_UNITS: usize = 8;

bitflags! {
    /// Fixed-function toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const DEPTH_TEST  = 1 << 0;
        const DEPTH_WRITE = 1 << 1;
        const CULL_FACE   = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    None,
    #[default]
    Alpha,
    PremulAlpha,
    Add,
    Sub,
    Multiply,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Never,
    Always,
    Equal,
    NotEqual,
    #[default]
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VsyncMode {
    Off,
    #[default]
    On,
    Adaptive,
}

macro_rules! handle {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);
    };
}

handle!(
    /// Backend shader program.
    ShaderId
);
handle!(
    /// Backend texture object.
    TextureId
);
handle!(
    /// Backend framebuffer; `None` in state means the default target.
    FramebufferId
);
handle!(
    /// Backend vertex array object.
    VertexArrayId
);

/// Bindings for every tracked texture unit.
pub type TextureUnits = [Option<TextureId>; TEXTURE_UNITS];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl IRect {
    #[inline]
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}
