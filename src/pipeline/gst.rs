//! GStreamer-backed frame source and sink.
//!
//! The launch descriptions come straight from the configuration and are
//! treated as opaque; the only convention imposed here is the name of the
//! boundary element: the source description must contain an `appsink` named
//! `framesink`, the sink description an `appsrc` named `framesrc`. Example
//! source for a Raspberry Pi camera:
//!
//! `libcamerasrc ! video/x-raw,width=1280,height=720 ! videoconvert !
//!  appsink name=framesink`

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

use crate::config::DaemonConfig;
use crate::frame::Frame;
use crate::pipeline::{FrameSink, FrameSource};

pub(crate) struct GstFrameSource {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    description: String,
    frame_timeout: Duration,
    frame_count: u64,
    open: bool,
    last_error: Option<String>,
}

impl GstFrameSource {
    pub(crate) fn new(config: &DaemonConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline = gstreamer::parse::launch(&config.source_pipeline)
            .context("build source pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("source description is not a pipeline"))?;

        let appsink = pipeline
            .by_name("framesink")
            .context("source pipeline has no appsink named 'framesink'")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("'framesink' element is not an appsink"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        let frame_timeout = if config.capture_fps == 0 {
            Duration::from_millis(500)
        } else {
            Duration::from_millis((1000 / config.capture_fps).max(100) as u64 * 4)
        };

        Ok(Self {
            pipeline,
            appsink,
            description: config.source_pipeline.clone(),
            frame_timeout,
            frame_count: 0,
            open: false,
            last_error: None,
        })
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(gstreamer::ClockTime::ZERO) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("source reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

impl FrameSource for GstFrameSource {
    fn open(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set source pipeline to Playing")?;
        self.open = true;
        log::info!("source pipeline playing: {}", self.description);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open && self.last_error.is_none()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.poll_bus();
        if let Some(error) = &self.last_error {
            return Err(anyhow!("source pipeline failed: {}", error));
        }

        let timeout = gstreamer::ClockTime::try_from(self.frame_timeout).ok();
        let Some(sample) = self.appsink.try_pull_sample(timeout) else {
            // Stall, not a hard failure; the capture worker retries.
            return Ok(None);
        };

        self.frame_count += 1;
        sample_to_frame(&sample, self.frame_count).map(Some)
    }

    fn release(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("source pipeline teardown failed: {}", e);
        }
        self.open = false;
    }
}

pub(crate) struct GstFrameSink {
    pipeline: gstreamer::Pipeline,
    appsrc: gstreamer_app::AppSrc,
    description: String,
    open: bool,
}

impl GstFrameSink {
    pub(crate) fn new(config: &DaemonConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline = gstreamer::parse::launch(&config.sink_pipeline)
            .context("build sink pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("sink description is not a pipeline"))?;

        let appsrc = pipeline
            .by_name("framesrc")
            .context("sink pipeline has no appsrc named 'framesrc'")?
            .downcast::<gstreamer_app::AppSrc>()
            .map_err(|_| anyhow!("'framesrc' element is not an appsrc"))?;

        Ok(Self {
            pipeline,
            appsrc,
            description: config.sink_pipeline.clone(),
            open: false,
        })
    }
}

impl FrameSink for GstFrameSink {
    fn open(&mut self, config: &DaemonConfig) -> Result<()> {
        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", config.width as i32)
            .field("height", config.height as i32)
            .field(
                "framerate",
                gstreamer::Fraction::new(config.stream_fps as i32, 1),
            )
            .build();
        self.appsrc.set_caps(Some(&caps));
        self.appsrc.set_format(gstreamer::Format::Time);

        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set sink pipeline to Playing")?;
        self.open = true;
        log::info!("sink pipeline playing: {}", self.description);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let buffer = gstreamer::Buffer::from_mut_slice(frame.raw_bytes().to_vec());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|flow| anyhow!("push frame to sink: {:?}", flow))?;
        Ok(())
    }

    fn release(&mut self) {
        let _ = self.appsrc.end_of_stream();
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("sink pipeline teardown failed: {}", e);
        }
        self.open = false;
    }
}

fn sample_to_frame(sample: &gstreamer::Sample, seq: u64) -> Result<Frame> {
    let buffer = sample.buffer().context("sample missing buffer")?;
    let caps = sample.caps().context("sample missing caps")?;
    let info = gstreamer_video::VideoInfo::from_caps(caps).context("parse caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer.map_readable().context("map sample buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Frame::from_raw(width, height, data.to_vec(), seq);
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).context("buffer row out of bounds")?);
    }
    Frame::from_raw(width, height, pixels, seq)
}
