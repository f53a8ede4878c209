use glam::{Mat4, Vec3};

/// Entries per matrix stack.
pub const MATRIX_STACK_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    #[default]
    Modelview,
    Projection,
    Texture,
}

/// Fixed-capacity stack of 4x4 matrices. Never empty.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    stack: [Mat4; MATRIX_STACK_CAPACITY],
    head: usize,
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixStack {
    pub fn new() -> Self {
        Self {
            stack: [Mat4::IDENTITY; MATRIX_STACK_CAPACITY],
            head: 0,
        }
    }

    /// Back to a single identity matrix.
    pub fn reset(&mut self) {
        self.head = 0;
        self.stack[0] = Mat4::IDENTITY;
    }

    /// Duplicate the head.
    pub fn push(&mut self) {
        assert!(
            self.head + 1 < MATRIX_STACK_CAPACITY,
            "matrix stack overflow ({MATRIX_STACK_CAPACITY} entries)"
        );
        self.stack[self.head + 1] = self.stack[self.head];
        self.head += 1;
    }

    /// Push `m` as the new head.
    pub fn push_premade(&mut self, m: Mat4) {
        assert!(
            self.head + 1 < MATRIX_STACK_CAPACITY,
            "matrix stack overflow ({MATRIX_STACK_CAPACITY} entries)"
        );
        self.head += 1;
        self.stack[self.head] = m;
    }

    pub fn pop(&mut self) {
        assert!(self.head > 0, "matrix stack underflow: cannot pop the last matrix");
        self.head -= 1;
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.head + 1
    }

    #[inline]
    pub fn top(&self) -> &Mat4 {
        &self.stack[self.head]
    }

    #[inline]
    pub fn top_mut(&mut self) -> &mut Mat4 {
        &mut self.stack[self.head]
    }
}

/// Modelview, projection and texture stacks plus the active-mode selector.
#[derive(Debug, Clone, Default)]
pub struct Matrices {
    stacks: [MatrixStack; 3],
    mode: MatrixMode,
}

impl Matrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every stack and select modelview.
    pub fn reset(&mut self) {
        for s in &mut self.stacks {
            s.reset();
        }
        self.mode = MatrixMode::Modelview;
    }

    #[inline]
    pub fn mode(&self) -> MatrixMode {
        self.mode
    }

    /// Switch the active stack. Does not record rollback state;
    /// use [`Renderer::mat_mode`](super::Renderer::mat_mode) for that.
    #[inline]
    pub fn set_mode(&mut self, mode: MatrixMode) {
        self.mode = mode;
    }

    #[inline]
    pub fn stack(&self, mode: MatrixMode) -> &MatrixStack {
        &self.stacks[mode as usize]
    }

    #[inline]
    pub fn stack_mut(&mut self, mode: MatrixMode) -> &mut MatrixStack {
        &mut self.stacks[mode as usize]
    }

    #[inline]
    pub fn active(&self) -> &MatrixStack {
        self.stack(self.mode)
    }

    #[inline]
    pub fn active_mut(&mut self) -> &mut MatrixStack {
        self.stack_mut(self.mode)
    }

    #[inline]
    pub fn current(&self, mode: MatrixMode) -> Mat4 {
        *self.stack(mode).top()
    }

    #[inline]
    pub fn set(&mut self, mode: MatrixMode, m: Mat4) {
        *self.stack_mut(mode).top_mut() = m;
    }

    pub fn push(&mut self) {
        self.active_mut().push();
    }

    pub fn push_premade(&mut self, m: Mat4) {
        self.active_mut().push_premade(m);
    }

    pub fn pop(&mut self) {
        self.active_mut().pop();
    }

    pub fn identity(&mut self) {
        *self.active_mut().top_mut() = Mat4::IDENTITY;
    }

    pub fn translate(&mut self, v: Vec3) {
        let m = self.active_mut().top_mut();
        *m *= Mat4::from_translation(v);
    }

    /// Rotate by `angle` radians around `axis`.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        let m = self.active_mut().top_mut();
        *m *= Mat4::from_axis_angle(axis.normalize(), angle);
    }

    pub fn scale(&mut self, v: Vec3) {
        let m = self.active_mut().top_mut();
        *m *= Mat4::from_scale(v);
    }

    /// Replace the active head with an orthographic projection.
    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        *self.active_mut().top_mut() =
            Mat4::orthographic_rh_gl(left, right, bottom, top, near, far);
    }

    /// Replace the active head with a perspective projection (`fovy` in radians).
    pub fn perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        *self.active_mut().top_mut() = Mat4::perspective_rh_gl(fovy, aspect, near, far);
    }
}
