use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::render::VsyncMode;

pub const ENV_FRAMELIMITER_SLEEP: &str = "DANMAKU_FRAMELIMITER_SLEEP";
pub const ENV_FRAMELIMITER_COMPENSATE: &str = "DANMAKU_FRAMELIMITER_COMPENSATE";
pub const ENV_FRAMELIMITER_LOGIC_ONLY: &str = "DANMAKU_FRAMELIMITER_LOGIC_ONLY";

/// Longest accepted `[telemetry] fps_log_period_sec`.
pub const MAX_FPS_LOG_PERIOD_SEC: f32 = 3600.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub game: GameConfig,
    pub framelimiter: FrameLimiterConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "danmaku".to_string(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub target_fps: u32,

    /// Max logic steps per superframe while a frame reports `Skip`.
    pub skip_speed: u32,

    /// Render every Nth superframe.
    pub frameskip: u32,

    pub vsync: VsyncMode,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            skip_speed: 10,
            frameskip: 1,
            vsync: VsyncMode::On,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLimiterConfig {
    /// Sleep until `target / sleep` remains, then spin. 0 spins the whole wait.
    pub sleep: u32,

    /// Absorb up to one frame of overrun instead of slowing down.
    pub compensate: bool,

    /// Cap only the logic rate; render as fast as possible.
    pub logic_only: bool,
}

impl Default for FrameLimiterConfig {
    fn default() -> Self {
        Self {
            sleep: 3,
            compensate: true,
            logic_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_fps: bool,
    pub fps_log_period_sec: f32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_fps: true,
            fps_log_period_sec: 1.0,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => {
                let cfg: Self = toml::from_str(&s)
                    .map_err(|e| EngineError::Config(format!("parse {}: {}", path.display(), e)))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let cfg: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.game.target_fps == 0 {
            return Err(EngineError::Config("game.target_fps must be positive".into()));
        }
        let period = self.telemetry.fps_log_period_sec;
        if !period.is_finite() || period > MAX_FPS_LOG_PERIOD_SEC {
            return Err(EngineError::Config(format!(
                "telemetry.fps_log_period_sec must be finite and at most \
                 {MAX_FPS_LOG_PERIOD_SEC}, got {period}"
            )));
        }
        Ok(())
    }

    /// Apply `DANMAKU_FRAMELIMITER_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        let fl = &mut self.framelimiter;
        if let Some(v) = parse_env::<u32>(&get, ENV_FRAMELIMITER_SLEEP) {
            fl.sleep = v;
        }
        if let Some(v) = parse_env::<u32>(&get, ENV_FRAMELIMITER_COMPENSATE) {
            fl.compensate = v != 0;
        }
        if let Some(v) = parse_env::<u32>(&get, ENV_FRAMELIMITER_LOGIC_ONLY) {
            fl.logic_only = v != 0;
        }
    }
}

fn parse_env<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [game]
            skip_speed = 4
            vsync = "adaptive"

            [framelimiter]
            compensate = false
            "#,
        )
        .unwrap();

        assert_eq!(cfg.game.skip_speed, 4);
        assert_eq!(cfg.game.vsync, VsyncMode::Adaptive);
        assert_eq!(cfg.game.target_fps, 60);
        assert!(!cfg.framelimiter.compensate);
        assert_eq!(cfg.framelimiter.sleep, 3);
        assert_eq!(cfg.window, WindowConfig::default());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::load_or_default(dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[game]\nskip_speed = \"fast\"").unwrap();
        let err = EngineConfig::load_or_default(f.path()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "{err}");
    }

    #[test]
    fn zero_target_fps_is_rejected() {
        let err = EngineConfig::from_toml_str("[game]\ntarget_fps = 0").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "{err}");

        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[game]\ntarget_fps = 0").unwrap();
        let err = EngineConfig::load_or_default(f.path()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "{err}");
    }

    #[test]
    fn unbounded_fps_log_period_is_rejected() {
        for bad in ["inf", "nan", "1e30"] {
            let toml = format!("[telemetry]\nfps_log_period_sec = {bad}");
            let err = EngineConfig::from_toml_str(&toml).unwrap_err();
            assert!(matches!(err, EngineError::Config(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn short_fps_log_period_is_accepted() {
        let cfg = EngineConfig::from_toml_str("[telemetry]\nfps_log_period_sec = -2.0").unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_overrides_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            (ENV_FRAMELIMITER_SLEEP, "0"),
            (ENV_FRAMELIMITER_COMPENSATE, "nah"),
            (ENV_FRAMELIMITER_LOGIC_ONLY, "1"),
        ]
        .into_iter()
        .collect();

        let mut cfg = EngineConfig::default();
        cfg.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.framelimiter.sleep, 0);
        assert!(cfg.framelimiter.compensate);
        assert!(cfg.framelimiter.logic_only);
    }
}
