//! On-demand multipart frame feed.
//!
//! A [`FrameFeed`] is a pull-based, rate-limited iterator over serialized
//! frames: each item is one self-delimited multipart chunk carrying a JPEG
//! payload, ready to be written to a `multipart/x-mixed-replace` response
//! body. Any number of feeds can run concurrently; each holds only its own
//! pacing state and reads the shared latest frame under the frame lock.
//!
//! A feed ends (returns `None`) once the capture worker stops producing,
//! and is otherwise infinite. Encode failures skip the tick after a short
//! delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::frame::JPEG_QUALITY;
use crate::overlay;
use crate::state::SharedState;

/// Boundary token used between multipart chunks.
pub const MULTIPART_BOUNDARY: &str = "frame";

/// MIME type a consumer-facing HTTP layer should send for this feed.
pub const MULTIPART_MIME_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// How long a feed waits before retrying when no frame is published yet or
/// the encode failed.
const EMPTY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug)]
pub struct FeedOptions {
    /// Target emission rate.
    pub fps: u32,
    /// Optional output resolution; `None` streams at capture resolution.
    pub resize: Option<(u32, u32)>,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            fps: 1,
            resize: None,
        }
    }
}

pub struct FrameFeed {
    state: Arc<SharedState>,
    capture_live: Arc<AtomicBool>,
    options: FeedOptions,
}

impl FrameFeed {
    pub(crate) fn new(
        state: Arc<SharedState>,
        capture_live: Arc<AtomicBool>,
        options: FeedOptions,
    ) -> Self {
        Self {
            state,
            capture_live,
            options,
        }
    }

    fn emission_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.options.fps.max(1)))
    }

    /// Serialize the current frame under the frame lock: resize, overlay the
    /// latest sensor snapshot, encode. `None` if no frame is published yet.
    fn encode_current(&self) -> Option<Result<Vec<u8>>> {
        let resize = self.options.resize;
        self.state.with_frame(|frame| {
            let mut copy = match resize {
                Some((width, height)) => frame.resized(width, height),
                None => frame.clone(),
            };
            overlay::draw_telemetry(&mut copy, &self.state.read_sensor());
            copy.encode_jpeg(JPEG_QUALITY)
        })
    }
}

impl Iterator for FrameFeed {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.capture_live.load(Ordering::SeqCst) {
                return None;
            }
            let started = Instant::now();

            let encoded = match self.encode_current() {
                None => {
                    // Capture has not published anything yet; retry shortly.
                    std::thread::sleep(EMPTY_POLL_INTERVAL);
                    continue;
                }
                Some(Err(e)) => {
                    log::warn!("feed encode failed, skipping tick: {}", e);
                    std::thread::sleep(EMPTY_POLL_INTERVAL);
                    continue;
                }
                Some(Ok(jpeg)) => jpeg,
            };

            let budget = self.emission_budget();
            let elapsed = started.elapsed();
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            }

            return Some(multipart_chunk(&encoded));
        }
    }
}

fn multipart_chunk(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", MULTIPART_BOUNDARY);
    let mut chunk = Vec::with_capacity(header.len() + jpeg.len() + 2);
    chunk.extend_from_slice(header.as_bytes());
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    chunk
}
