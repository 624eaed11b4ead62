//! Synthetic frame source and sink.
//!
//! Selected for `stub://` pipeline descriptions. The source generates a
//! moving gradient so successive frames differ; the sink records the
//! sequence numbers it was given. Both expose shared counters so tests can
//! observe forwarding and release behavior after ownership moves into the
//! capture worker.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::DaemonConfig;
use crate::frame::Frame;
use crate::pipeline::{FrameSink, FrameSource};

pub struct SyntheticSource {
    width: u32,
    height: u32,
    /// Frames left to produce; `None` means unlimited.
    remaining: Option<u64>,
    seq: u64,
    open: bool,
    releases: Arc<AtomicUsize>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            remaining: None,
            seq: 0,
            open: false,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Produce exactly `frames` frames, then report closed.
    pub fn with_frame_limit(width: u32, height: u32, frames: u64) -> Self {
        Self {
            remaining: Some(frames),
            ..Self::new(width, height)
        }
    }

    /// Shared release counter, for observing teardown after the source has
    /// been handed to the daemon.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        self.releases.clone()
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.width * self.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.seq * 7) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        log::info!("synthetic source open ({}x{})", self.width, self.height);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open && self.remaining != Some(0)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.is_open() {
            return Ok(None);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.seq += 1;
        let frame = Frame::from_raw(self.width, self.height, self.generate_pixels(), self.seq)?;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.open = false;
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct SyntheticSink {
    open: bool,
    written: Arc<Mutex<Vec<u64>>>,
    releases: Arc<AtomicUsize>,
}

impl SyntheticSink {
    pub fn new() -> Self {
        Self {
            open: false,
            written: Arc::new(Mutex::new(Vec::new())),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared record of written frame sequence numbers.
    pub fn written(&self) -> Arc<Mutex<Vec<u64>>> {
        self.written.clone()
    }

    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        self.releases.clone()
    }
}

impl Default for SyntheticSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for SyntheticSink {
    fn open(&mut self, _config: &DaemonConfig) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if !self.open {
            return Err(anyhow!("sink is closed"));
        }
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        written.push(frame.seq());
        Ok(())
    }

    fn release(&mut self) {
        self.open = false;
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_source_closes_after_its_frames() -> Result<()> {
        let mut source = SyntheticSource::with_frame_limit(64, 48, 2);
        source.open()?;

        assert!(source.is_open());
        let first = source.read_frame()?.expect("first frame");
        let second = source.read_frame()?.expect("second frame");
        assert_eq!(first.seq(), 1);
        assert_eq!(second.seq(), 2);

        assert!(!source.is_open());
        assert!(source.read_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn successive_frames_differ() -> Result<()> {
        let mut source = SyntheticSource::new(64, 48);
        source.open()?;
        let a = source.read_frame()?.expect("frame");
        let b = source.read_frame()?.expect("frame");
        assert_ne!(a.raw_bytes(), b.raw_bytes());
        Ok(())
    }

    #[test]
    fn sink_records_written_sequence_numbers() -> Result<()> {
        let mut sink = SyntheticSink::new();
        let written = sink.written();
        sink.open(&DaemonConfig::default())?;

        let frame = Frame::from_raw(8, 8, vec![0; 8 * 8 * 3], 42)?;
        sink.write_frame(&frame)?;

        assert_eq!(*written.lock().unwrap(), vec![42]);
        Ok(())
    }

    #[test]
    fn closed_sink_rejects_writes() -> Result<()> {
        let mut sink = SyntheticSink::new();
        let frame = Frame::from_raw(8, 8, vec![0; 8 * 8 * 3], 1)?;
        assert!(sink.write_frame(&frame).is_err());
        Ok(())
    }

    #[test]
    fn release_counter_tracks_teardown() -> Result<()> {
        let mut source = SyntheticSource::new(8, 8);
        let releases = source.release_counter();
        source.open()?;
        source.release();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(!source.is_open());
        Ok(())
    }
}
