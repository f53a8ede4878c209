use bitflags::bitflags;

use super::{
    BlendMode, Capabilities, Color, CullMode, DepthFunc, FramebufferId, IRect, Matrices,
    MatrixMode, RenderBackend, ShaderId, TextureUnits, VertexArrayId, VsyncMode,
};

/// Maximum nesting of rollback scopes.
pub const STATE_STACK_CAPACITY: usize = 16;

bitflags! {
    /// Categories captured by a [`RollbackFrame`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyBits: u32 {
        const CAPABILITIES    = 1 << 0;
        const MATRIX_MODE     = 1 << 1;
        const COLOR           = 1 << 2;
        const CLEAR_COLOR     = 1 << 3;
        const BLEND_MODE      = 1 << 4;
        const CULL_MODE       = 1 << 5;
        const DEPTH_FUNC      = 1 << 6;
        const SHADER          = 1 << 7;
        /// Reserved; uniforms are never captured.
        const SHADER_UNIFORMS = 1 << 8;
        const TEXTURE_UNITS   = 1 << 9;
        const RENDER_TARGET   = 1 << 10;
        const VERTEX_ARRAY    = 1 << 11;
        const SCISSOR         = 1 << 12;
        const VSYNC           = 1 << 13;
    }
}

/// Values captured on first touch within one scope.
///
/// A field is meaningful only while its bit is set in `dirty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackFrame {
    pub dirty: DirtyBits,

    capabilities: Capabilities,
    matrix_mode: MatrixMode,
    color: Color,
    clear_color: Color,
    blend_mode: BlendMode,
    cull_mode: CullMode,
    depth_func: DepthFunc,
    shader: Option<ShaderId>,
    textures: TextureUnits,
    framebuffer: Option<FramebufferId>,
    vertex_array: Option<VertexArrayId>,
    scissor: Option<IRect>,
    vsync: VsyncMode,
}

/// Stack of copy-on-first-write render state snapshots.
///
/// `push` opens a scope with nothing captured. Each `touch_*` call made
/// while a scope is open records the backend's current value for that
/// category, but only the first time in that scope. `pop` writes back every
/// captured value, so the backend ends up as it was at `push`, however
/// many times the state changed in between.
#[derive(Debug)]
pub struct RenderStateTracker {
    frames: [RollbackFrame; STATE_STACK_CAPACITY],
    depth: usize,
}

impl Default for RenderStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderStateTracker {
    pub fn new() -> Self {
        Self {
            frames: [RollbackFrame::default(); STATE_STACK_CAPACITY],
            depth: 0,
        }
    }

    /// Open scopes.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// The innermost scope, if any.
    #[inline]
    pub fn head(&self) -> Option<&RollbackFrame> {
        self.depth.checked_sub(1).map(|i| &self.frames[i])
    }

    pub fn push(&mut self) {
        assert!(
            self.depth < STATE_STACK_CAPACITY,
            "render state stack overflow ({STATE_STACK_CAPACITY} scopes)"
        );
        self.frames[self.depth].dirty = DirtyBits::empty();
        self.depth += 1;
    }

    /// Close the innermost scope, restoring everything it captured.
    pub fn pop(&mut self, backend: &mut dyn RenderBackend, matrices: &mut Matrices) {
        assert!(self.depth > 0, "render state stack underflow");
        let f = self.frames[self.depth - 1];
        let d = f.dirty;

        if d.contains(DirtyBits::CAPABILITIES) {
            backend.set_capabilities(f.capabilities);
        }
        if d.contains(DirtyBits::MATRIX_MODE) {
            matrices.set_mode(f.matrix_mode);
        }
        if d.contains(DirtyBits::COLOR) {
            backend.set_color(f.color);
        }
        if d.contains(DirtyBits::CLEAR_COLOR) {
            backend.set_clear_color(f.clear_color);
        }
        if d.contains(DirtyBits::BLEND_MODE) {
            backend.set_blend_mode(f.blend_mode);
        }
        if d.contains(DirtyBits::CULL_MODE) {
            backend.set_cull_mode(f.cull_mode);
        }
        if d.contains(DirtyBits::DEPTH_FUNC) {
            backend.set_depth_func(f.depth_func);
        }
        if d.contains(DirtyBits::SHADER) {
            backend.set_shader(f.shader);
        }
        if d.contains(DirtyBits::TEXTURE_UNITS) {
            backend.set_texture_units(&f.textures);
        }
        if d.contains(DirtyBits::RENDER_TARGET) {
            backend.set_framebuffer(f.framebuffer);
        }
        if d.contains(DirtyBits::VERTEX_ARRAY) {
            backend.set_vertex_array(f.vertex_array);
        }
        if d.contains(DirtyBits::SCISSOR) {
            backend.set_scissor(f.scissor);
        }
        if d.contains(DirtyBits::VSYNC) {
            backend.set_vsync(f.vsync);
        }

        self.depth -= 1;
    }

    /// Innermost frame if `bit` is not captured there yet; marks it captured.
    #[inline]
    fn first_touch(&mut self, bit: DirtyBits) -> Option<&mut RollbackFrame> {
        let f = self.frames[..self.depth].last_mut()?;
        if f.dirty.contains(bit) {
            return None;
        }
        f.dirty.insert(bit);
        Some(f)
    }

    pub fn touch_capabilities(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::CAPABILITIES) {
            f.capabilities = b.capabilities();
        }
    }

    pub fn touch_matrix_mode(&mut self, current: MatrixMode) {
        if let Some(f) = self.first_touch(DirtyBits::MATRIX_MODE) {
            f.matrix_mode = current;
        }
    }

    pub fn touch_color(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::COLOR) {
            f.color = b.color();
        }
    }

    pub fn touch_clear_color(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::CLEAR_COLOR) {
            f.clear_color = b.clear_color();
        }
    }

    pub fn touch_blend_mode(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::BLEND_MODE) {
            f.blend_mode = b.blend_mode();
        }
    }

    pub fn touch_cull_mode(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::CULL_MODE) {
            f.cull_mode = b.cull_mode();
        }
    }

    pub fn touch_depth_func(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::DEPTH_FUNC) {
            f.depth_func = b.depth_func();
        }
    }

    pub fn touch_shader(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::SHADER) {
            f.shader = b.shader();
        }
    }

    /// Uniform values are not rolled back.
    #[inline]
    pub fn touch_uniform(&mut self) {}

    pub fn touch_texture_units(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::TEXTURE_UNITS) {
            f.textures = b.texture_units();
        }
    }

    pub fn touch_framebuffer(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::RENDER_TARGET) {
            f.framebuffer = b.framebuffer();
        }
    }

    pub fn touch_vertex_array(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::VERTEX_ARRAY) {
            f.vertex_array = b.vertex_array();
        }
    }

    pub fn touch_scissor(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::SCISSOR) {
            f.scissor = b.scissor();
        }
    }

    pub fn touch_vsync(&mut self, b: &dyn RenderBackend) {
        if let Some(f) = self.first_touch(DirtyBits::VSYNC) {
            f.vsync = b.vsync();
        }
    }
}
