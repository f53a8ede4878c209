use log::trace;

use super::{
    BlendMode, Capabilities, Color, CullMode, DepthFunc, FramebufferId, IRect, RenderBackend,
    ShaderId, TextureId, TextureUnits, VertexArrayId, VsyncMode, TEXTURE_UNITS,
};

/// Backend that only remembers what was bound.
///
/// Used headless (replay verification, servers) and by tests.
#[derive(Debug, Clone, Default)]
pub struct NullBackend {
    capabilities: Capabilities,
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

    viewport: (u32, u32),
    clears: u64,
    swaps: u64,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn clears(&self) -> u64 {
        self.clears
    }

    #[inline]
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    #[inline]
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }
}

impl RenderBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn set_capabilities(&mut self, caps: Capabilities) {
        self.capabilities = caps;
    }

    fn color(&self) -> Color {
        self.color
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    fn clear_color(&self) -> Color {
        self.clear_color
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    fn cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull_mode = mode;
    }

    fn depth_func(&self) -> DepthFunc {
        self.depth_func
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.depth_func = func;
    }

    fn shader(&self) -> Option<ShaderId> {
        self.shader
    }

    fn set_shader(&mut self, shader: Option<ShaderId>) {
        self.shader = shader;
    }

    fn texture_units(&self) -> TextureUnits {
        self.textures
    }

    fn set_texture(&mut self, unit: usize, texture: Option<TextureId>) {
        assert!(unit < TEXTURE_UNITS, "texture unit {unit} out of range");
        self.textures[unit] = texture;
    }

    fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    fn set_framebuffer(&mut self, fb: Option<FramebufferId>) {
        self.framebuffer = fb;
    }

    fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    fn set_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.vertex_array = vao;
    }

    fn scissor(&self) -> Option<IRect> {
        self.scissor
    }

    fn set_scissor(&mut self, rect: Option<IRect>) {
        self.scissor = rect;
    }

    fn vsync(&self) -> VsyncMode {
        self.vsync
    }

    fn set_vsync(&mut self, mode: VsyncMode) {
        self.vsync = mode;
    }

    fn clear(&mut self, _color: Color) {
        self.clears += 1;
    }

    fn swap_buffers(&mut self) {
        self.swaps += 1;
        trace!("null backend: swap #{}", self.swaps);
    }

    fn resize_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }
}
