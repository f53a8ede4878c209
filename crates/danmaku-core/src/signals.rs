use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::EngineResult;

/// Process-wide cooperative quit request.
///
/// Checked by every logic step; once set, the running loop frame is forced
/// to stop. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct QuitFlag {
    flag: Arc<AtomicBool>,
}

impl QuitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Route Ctrl+C into this flag.
    pub fn install_ctrlc(&self) -> EngineResult<()> {
        let flag = self.flag.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_request() {
        let a = QuitFlag::new();
        let b = a.clone();
        assert!(!b.is_requested());
        a.request();
        assert!(b.is_requested());
    }
}
