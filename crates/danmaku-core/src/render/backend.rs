use super::{
    BlendMode, Capabilities, Color, CullMode, DepthFunc, FramebufferId, IRect, ShaderId,
    TextureId, TextureUnits, VertexArrayId, VsyncMode,
};

/// Graphics backend contract.
///
/// One getter/setter pair per tracked state category. Getters report what
/// the backend currently has bound; they are read when a rollback scope
/// first touches a category. Setters are called by the [`Renderer`] and by
/// rollback restoration.
///
/// [`Renderer`]: super::Renderer
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;
    fn set_capabilities(&mut self, caps: Capabilities);

    fn color(&self) -> Color;
    fn set_color(&mut self, color: Color);

    fn clear_color(&self) -> Color;
    fn set_clear_color(&mut self, color: Color);

    fn blend_mode(&self) -> BlendMode;
    fn set_blend_mode(&mut self, mode: BlendMode);

    fn cull_mode(&self) -> CullMode;
    fn set_cull_mode(&mut self, mode: CullMode);

    fn depth_func(&self) -> DepthFunc;
    fn set_depth_func(&mut self, func: DepthFunc);

    fn shader(&self) -> Option<ShaderId>;
    fn set_shader(&mut self, shader: Option<ShaderId>);

    fn texture_units(&self) -> TextureUnits;
    fn set_texture(&mut self, unit: usize, texture: Option<TextureId>);

    fn framebuffer(&self) -> Option<FramebufferId>;
    fn set_framebuffer(&mut self, fb: Option<FramebufferId>);

    fn vertex_array(&self) -> Option<VertexArrayId>;
    fn set_vertex_array(&mut self, vao: Option<VertexArrayId>);

    fn scissor(&self) -> Option<IRect>;
    fn set_scissor(&mut self, rect: Option<IRect>);

    fn vsync(&self) -> VsyncMode;
    fn set_vsync(&mut self, mode: VsyncMode);

    /// Clear the bound framebuffer with `color` and depth 1.0.
    fn clear(&mut self, color: Color);

    /// Present the default framebuffer.
    fn swap_buffers(&mut self);

    /// The output surface changed size.
    fn resize_viewport(&mut self, _width: u32, _height: u32) {}

    fn set_texture_units(&mut self, units: &TextureUnits) {
        for (unit, tex) in units.iter().enumerate() {
            self.set_texture(unit, *tex);
        }
    }
}
