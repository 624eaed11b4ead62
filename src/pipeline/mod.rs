//! Frame source and sink capability contracts.
//!
//! The daemon core never constructs camera or encoder machinery itself; it
//! receives boxed implementations of these traits. Backends:
//!
//! - `stub://` descriptions select the synthetic backend (tests, deployments
//!   without hardware);
//! - anything else requires the `pipeline-gstreamer` feature and is treated
//!   as an opaque GStreamer launch description.

pub mod synthetic;

#[cfg(feature = "pipeline-gstreamer")]
pub(crate) mod gst;

pub use synthetic::{SyntheticSink, SyntheticSource};

use anyhow::Result;

use crate::config::DaemonConfig;
use crate::frame::Frame;

/// A camera-like device that yields raw frames on demand.
///
/// `read_frame` may block up to roughly one frame interval. `Ok(None)` means
/// no frame was available this cycle; the capture worker skips the cycle.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<()>;
    fn is_open(&self) -> bool;
    fn read_frame(&mut self) -> Result<Option<Frame>>;
    /// Best-effort teardown. Called exactly once by the capture worker.
    fn release(&mut self);
}

/// A streaming/recording output that accepts frames at the stream rate.
pub trait FrameSink: Send {
    fn open(&mut self, config: &DaemonConfig) -> Result<()>;
    fn is_open(&self) -> bool;
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
    /// Best-effort teardown. Called exactly once by the capture worker.
    fn release(&mut self);
}

/// Build a frame source for the configured pipeline description.
pub fn source_for(config: &DaemonConfig) -> Result<Box<dyn FrameSource>> {
    if config.source_pipeline.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config.width, config.height)));
    }
    #[cfg(feature = "pipeline-gstreamer")]
    {
        Ok(Box::new(gst::GstFrameSource::new(config)?))
    }
    #[cfg(not(feature = "pipeline-gstreamer"))]
    {
        anyhow::bail!(
            "source pipeline '{}' requires the pipeline-gstreamer feature",
            config.source_pipeline
        )
    }
}

/// Build a frame sink for the configured pipeline description.
pub fn sink_for(config: &DaemonConfig) -> Result<Box<dyn FrameSink>> {
    if config.sink_pipeline.starts_with("stub://") {
        return Ok(Box::new(SyntheticSink::new()));
    }
    #[cfg(feature = "pipeline-gstreamer")]
    {
        Ok(Box::new(gst::GstFrameSink::new(config)?))
    }
    #[cfg(not(feature = "pipeline-gstreamer"))]
    {
        anyhow::bail!(
            "sink pipeline '{}' requires the pipeline-gstreamer feature",
            config.sink_pipeline
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_scheme_selects_synthetic_backends() -> Result<()> {
        let config = DaemonConfig::default();
        let mut source = source_for(&config)?;
        let mut sink = sink_for(&config)?;
        source.open()?;
        sink.open(&config)?;
        assert!(source.is_open());
        assert!(sink.is_open());
        Ok(())
    }

    #[cfg(not(feature = "pipeline-gstreamer"))]
    #[test]
    fn hardware_pipeline_without_feature_is_an_error() {
        let config = DaemonConfig {
            source_pipeline: "libcamerasrc ! videoconvert ! appsink name=framesink".to_string(),
            ..DaemonConfig::default()
        };
        assert!(source_for(&config).is_err());
    }
}
