use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_CAPTURE_FPS: u32 = 30;
const DEFAULT_STREAM_FPS: u32 = 10;
const DEFAULT_CAPTURE_DIR: &str = "capture";
const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 60;
const DEFAULT_SOURCE_PIPELINE: &str = "stub://birdhouse";
const DEFAULT_SINK_PIPELINE: &str = "stub://stream";

#[derive(Debug, Deserialize, Default)]
struct NestcamConfigFile {
    camera: Option<CameraConfigFile>,
    capture: Option<CaptureConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    capture_fps: Option<u32>,
    stream_fps: Option<u32>,
    source_pipeline: Option<String>,
    sink_pipeline: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    directory: Option<PathBuf>,
    interval_seconds: Option<u64>,
}

/// Daemon configuration. Immutable after [`DaemonConfig::load`].
///
/// The pipeline strings are opaque descriptions handed to the frame source
/// and sink collaborators; the daemon never parses their internal syntax.
/// `stub://` selects the synthetic backend.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub width: u32,
    pub height: u32,
    pub capture_fps: u32,
    pub stream_fps: u32,
    pub capture_dir: PathBuf,
    pub snapshot_interval: Duration,
    pub source_pipeline: String,
    pub sink_pipeline: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            capture_fps: DEFAULT_CAPTURE_FPS,
            stream_fps: DEFAULT_STREAM_FPS,
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            snapshot_interval: Duration::from_secs(DEFAULT_SNAPSHOT_INTERVAL_SECS),
            source_pipeline: DEFAULT_SOURCE_PIPELINE.to_string(),
            sink_pipeline: DEFAULT_SINK_PIPELINE.to_string(),
        }
    }
}

impl DaemonConfig {
    /// Load from the file named by `NESTCAM_CONFIG` (if set), apply
    /// environment overrides, and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NESTCAM_CONFIG").ok();
        Self::load_with(config_path.as_deref().map(Path::new))
    }

    /// Like [`DaemonConfig::load`] with an explicit file path.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: NestcamConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        Self {
            width: camera.width.unwrap_or(DEFAULT_WIDTH),
            height: camera.height.unwrap_or(DEFAULT_HEIGHT),
            capture_fps: camera.capture_fps.unwrap_or(DEFAULT_CAPTURE_FPS),
            stream_fps: camera.stream_fps.unwrap_or(DEFAULT_STREAM_FPS),
            capture_dir: capture
                .directory
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR)),
            snapshot_interval: Duration::from_secs(
                capture
                    .interval_seconds
                    .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_SECS),
            ),
            source_pipeline: camera
                .source_pipeline
                .unwrap_or_else(|| DEFAULT_SOURCE_PIPELINE.to_string()),
            sink_pipeline: camera
                .sink_pipeline
                .unwrap_or_else(|| DEFAULT_SINK_PIPELINE.to_string()),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("NESTCAM_CAPTURE_DIR") {
            if !dir.trim().is_empty() {
                self.capture_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var("NESTCAM_SOURCE_PIPELINE") {
            if !url.trim().is_empty() {
                self.source_pipeline = url;
            }
        }
        if let Ok(url) = std::env::var("NESTCAM_SINK_PIPELINE") {
            if !url.trim().is_empty() {
                self.sink_pipeline = url;
            }
        }
        if let Ok(interval) = std::env::var("NESTCAM_SNAPSHOT_INTERVAL_SECS") {
            let seconds: u64 = interval.parse().map_err(|_| {
                anyhow!("NESTCAM_SNAPSHOT_INTERVAL_SECS must be an integer number of seconds")
            })?;
            self.snapshot_interval = Duration::from_secs(seconds);
        }
        if let Ok(fps) = std::env::var("NESTCAM_STREAM_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("NESTCAM_STREAM_FPS must be an integer"))?;
            self.stream_fps = fps;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("resolution must be non-zero"));
        }
        if self.capture_fps == 0 {
            return Err(anyhow!("capture_fps must be greater than zero"));
        }
        if self.stream_fps == 0 {
            return Err(anyhow!("stream_fps must be greater than zero"));
        }
        if self.snapshot_interval.as_secs() == 0 {
            return Err(anyhow!("snapshot interval must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<NestcamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = DaemonConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.stream_fps, 10);
        assert!(cfg.source_pipeline.starts_with("stub://"));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let cfg = DaemonConfig {
            width: 0,
            ..DaemonConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_snapshot_interval_is_rejected() {
        let cfg = DaemonConfig {
            snapshot_interval: Duration::from_secs(0),
            ..DaemonConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
