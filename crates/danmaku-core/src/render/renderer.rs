use std::ops::{Deref, DerefMut};

use glam::{Mat4, Vec3};
use log::debug;

use super::{
    BlendMode, Capabilities, Color, CullMode, DepthFunc, FramebufferId, IRect, Matrices,
    MatrixMode, RenderBackend, RenderStateTracker, ShaderId, TextureId, VertexArrayId, VsyncMode,
};

/// Front door for all render-state changes.
///
/// Every setter records the pre-change value in the innermost rollback
/// scope (if one is open) and only then forwards to the backend.
pub struct Renderer {
    backend: Box<dyn RenderBackend>,
    state: RenderStateTracker,
    matrices: Matrices,
    frames_presented: u64,
}

impl Renderer {
    pub fn new(backend: Box<dyn RenderBackend>) -> Self {
        debug!("renderer: backend={}", backend.name());
        Self {
            backend,
            state: RenderStateTracker::new(),
            matrices: Matrices::new(),
            frames_presented: 0,
        }
    }

    #[inline]
    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    #[inline]
    pub fn state(&self) -> &RenderStateTracker {
        &self.state
    }

    #[inline]
    pub fn matrices(&self) -> &Matrices {
        &self.matrices
    }

    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    // --- rollback scopes ---

    #[inline]
    pub fn state_push(&mut self) {
        self.state.push();
    }

    #[inline]
    pub fn state_pop(&mut self) {
        self.state.pop(self.backend.as_mut(), &mut self.matrices);
    }

    /// Open a rollback scope that closes when the guard drops.
    pub fn state_scope(&mut self) -> StateScope<'_> {
        self.state_push();
        StateScope { r: self }
    }

    // --- state setters ---

    pub fn set_capabilities(&mut self, caps: Capabilities) {
        self.state.touch_capabilities(self.backend.as_ref());
        self.backend.set_capabilities(caps);
    }

    pub fn enable(&mut self, cap: Capabilities) {
        let caps = self.backend.capabilities() | cap;
        self.set_capabilities(caps);
    }

    pub fn disable(&mut self, cap: Capabilities) {
        let caps = self.backend.capabilities().difference(cap);
        self.set_capabilities(caps);
    }

    pub fn set_color(&mut self, color: Color) {
        self.state.touch_color(self.backend.as_ref());
        self.backend.set_color(color);
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.state.touch_clear_color(self.backend.as_ref());
        self.backend.set_clear_color(color);
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.touch_blend_mode(self.backend.as_ref());
        self.backend.set_blend_mode(mode);
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.state.touch_cull_mode(self.backend.as_ref());
        self.backend.set_cull_mode(mode);
    }

    pub fn set_depth_func(&mut self, func: DepthFunc) {
        self.state.touch_depth_func(self.backend.as_ref());
        self.backend.set_depth_func(func);
    }

    pub fn set_shader(&mut self, shader: Option<ShaderId>) {
        self.state.touch_shader(self.backend.as_ref());
        self.backend.set_shader(shader);
    }

    /// Uniform writes go straight to the shader; they are not rolled back.
    pub fn touch_uniform(&mut self) {
        self.state.touch_uniform();
    }

    pub fn set_texture(&mut self, unit: usize, texture: Option<TextureId>) {
        self.state.touch_texture_units(self.backend.as_ref());
        self.backend.set_texture(unit, texture);
    }

    pub fn set_framebuffer(&mut self, fb: Option<FramebufferId>) {
        self.state.touch_framebuffer(self.backend.as_ref());
        self.backend.set_framebuffer(fb);
    }

    pub fn set_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.state.touch_vertex_array(self.backend.as_ref());
        self.backend.set_vertex_array(vao);
    }

    pub fn set_scissor(&mut self, rect: Option<IRect>) {
        self.state.touch_scissor(self.backend.as_ref());
        self.backend.set_scissor(rect);
    }

    pub fn set_vsync(&mut self, mode: VsyncMode) {
        self.state.touch_vsync(self.backend.as_ref());
        self.backend.set_vsync(mode);
    }

    // --- matrices ---

    pub fn mat_mode(&mut self, mode: MatrixMode) {
        self.state.touch_matrix_mode(self.matrices.mode());
        self.matrices.set_mode(mode);
    }

    #[inline]
    pub fn mat_mode_current(&self) -> MatrixMode {
        self.matrices.mode()
    }

    #[inline]
    pub fn mat_push(&mut self) {
        self.matrices.push();
    }

    #[inline]
    pub fn mat_push_premade(&mut self, m: Mat4) {
        self.matrices.push_premade(m);
    }

    #[inline]
    pub fn mat_pop(&mut self) {
        self.matrices.pop();
    }

    #[inline]
    pub fn mat_identity(&mut self) {
        self.matrices.identity();
    }

    #[inline]
    pub fn mat_translate(&mut self, v: Vec3) {
        self.matrices.translate(v);
    }

    #[inline]
    pub fn mat_rotate(&mut self, angle: f32, axis: Vec3) {
        self.matrices.rotate(angle, axis);
    }

    #[inline]
    pub fn mat_scale(&mut self, v: Vec3) {
        self.matrices.scale(v);
    }

    #[inline]
    pub fn mat_ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.matrices.ortho(left, right, bottom, top, near, far);
    }

    #[inline]
    pub fn mat_perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        self.matrices.perspective(fovy, aspect, near, far);
    }

    #[inline]
    pub fn mat_current(&self, mode: MatrixMode) -> Mat4 {
        self.matrices.current(mode)
    }

    #[inline]
    pub fn mat_set(&mut self, mode: MatrixMode, m: Mat4) {
        self.matrices.set(mode, m);
    }

    /// Reset all matrix stacks to identity, modelview active.
    pub fn mat_reset(&mut self) {
        self.state.touch_matrix_mode(self.matrices.mode());
        self.matrices.reset();
    }

    // --- frame ---

    /// Clear the bound framebuffer to opaque black.
    pub fn clear_framebuffer(&mut self) {
        self.backend.clear(Color::BLACK);
    }

    pub fn swap_buffers(&mut self) {
        self.backend.swap_buffers();
        self.frames_presented += 1;
    }

    pub fn resize_viewport(&mut self, width: u32, height: u32) {
        debug!("renderer: viewport {width}x{height}");
        self.backend.resize_viewport(width, height);
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("backend", &self.backend.name())
            .field("state_depth", &self.state.depth())
            .field("matrix_mode", &self.matrices.mode())
            .field("frames_presented", &self.frames_presented)
            .finish()
    }
}

/// Rollback scope guard returned by [`Renderer::state_scope`].
pub struct StateScope<'a> {
    r: &'a mut Renderer,
}

impl Deref for StateScope<'_> {
    type Target = Renderer;

    fn deref(&self) -> &Renderer {
        self.r
    }
}

impl DerefMut for StateScope<'_> {
    fn deref_mut(&mut self) -> &mut Renderer {
        self.r
    }
}

impl Drop for StateScope<'_> {
    fn drop(&mut self) {
        self.r.state_pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{NullBackend, TextureId};

    const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    fn renderer() -> Renderer {
        Renderer::new(Box::new(NullBackend::new()))
    }

    #[test]
    fn repeated_changes_roll_back_to_scope_entry() {
        let mut r = renderer();
        r.set_color(RED);

        r.state_push();
        r.set_color(BLUE);
        r.set_color(GREEN);
        r.set_blend_mode(BlendMode::Add);
        r.set_blend_mode(BlendMode::Multiply);
        r.state_pop();

        assert_eq!(r.backend().color(), RED);
        assert_eq!(r.backend().blend_mode(), BlendMode::Alpha);
    }

    #[test]
    fn nested_shader_scopes_unwind_in_order() {
        let mut r = renderer();
        let original = Some(ShaderId(1));
        r.set_shader(original);

        r.state_push();
        r.set_shader(Some(ShaderId(10)));
        r.state_push();
        r.set_shader(Some(ShaderId(20)));
        r.state_pop();
        assert_eq!(r.backend().shader(), Some(ShaderId(10)));
        r.state_pop();
        assert_eq!(r.backend().shader(), original);
    }

    #[test]
    fn scope_guard_pops_on_drop() {
        let mut r = renderer();
        {
            let mut s = r.state_scope();
            s.set_framebuffer(Some(FramebufferId(3)));
            s.set_texture(2, Some(TextureId(9)));
            s.enable(Capabilities::DEPTH_TEST);
            s.mat_mode(MatrixMode::Projection);
            assert_eq!(s.state().depth(), 1);
        }
        assert_eq!(r.state().depth(), 0);
        assert_eq!(r.backend().framebuffer(), None);
        assert_eq!(r.backend().texture_units()[2], None);
        assert!(r.backend().capabilities().is_empty());
        assert_eq!(r.mat_mode_current(), MatrixMode::Modelview);
    }

    #[test]
    fn changes_outside_scopes_stick() {
        let mut r = renderer();
        r.set_vsync(VsyncMode::Off);
        r.set_scissor(Some(IRect::new(0, 0, 10, 10)));
        assert_eq!(r.backend().vsync(), VsyncMode::Off);
        assert_eq!(r.backend().scissor(), Some(IRect::new(0, 0, 10, 10)));
    }

    #[test]
    fn disable_only_clears_requested_bits() {
        let mut r = renderer();
        r.set_capabilities(Capabilities::DEPTH_TEST | Capabilities::CULL_FACE);
        r.disable(Capabilities::CULL_FACE);
        assert_eq!(r.backend().capabilities(), Capabilities::DEPTH_TEST);
    }

    #[test]
    fn swap_counts_presented_frames() {
        let mut r = renderer();
        r.clear_framebuffer();
        r.swap_buffers();
        r.swap_buffers();
        assert_eq!(r.frames_presented(), 2);
    }
}
