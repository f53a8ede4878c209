use std::fmt;

use super::FrameStack;

type Continuation<T> = Box<dyn FnOnce(&mut FrameStack, T)>;

/// One-shot continuation a sub-loop hands its result to when it finishes.
///
/// The callee usually runs it from the leave hook given to
/// [`FrameStack::enter_with_leave`], where the stack already shows the
/// caller's frame on top, so the continuation may enter yet another loop.
pub struct CallChain<T> {
    next: Option<Continuation<T>>,
}

impl<T> CallChain<T> {
    pub fn new(f: impl FnOnce(&mut FrameStack, T) + 'static) -> Self {
        Self {
            next: Some(Box::new(f)),
        }
    }

    /// A chain that ignores its result.
    pub fn none() -> Self {
        Self { next: None }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.next.is_none()
    }

    /// Consume the chain, passing `result` on.
    pub fn run(self, stack: &mut FrameStack, result: T) {
        if let Some(f) = self.next {
            f(stack, result);
        }
    }

    /// Take the continuation out, leaving a dead end behind.
    #[inline]
    pub fn take(&mut self) -> Self {
        Self {
            next: self.next.take(),
        }
    }
}

impl<T> Default for CallChain<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> fmt::Debug for CallChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallChain")
            .field("armed", &self.next.is_some())
            .finish()
    }
}
