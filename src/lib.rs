//! nestcam - birdhouse camera capture daemon.
//!
//! A continuously-running daemon for a fixed camera and an environmental
//! sensor, producing three concurrent outputs:
//!
//! 1. a live annotated video stream forwarded to a frame sink at a reduced
//!    rate,
//! 2. periodic JPEG snapshots to a date-partitioned directory,
//! 3. on-demand multipart (MJPEG) feeds for remote viewers.
//!
//! # Architecture
//!
//! Three background workers run against one shared daemon instance:
//!
//! - the capture worker owns the frame source and sink exclusively,
//!   overlays telemetry on each frame, and publishes the latest frame;
//! - the snapshot worker persists the latest frame once per interval;
//! - the sensor worker polls the environmental sensor and host thermal
//!   reading.
//!
//! The only cross-worker state is the latest frame (mutex, held across any
//! processing read) and the latest sensor snapshot (immutable value behind
//! an Arc swap). A single shutdown signal with interruptible sleeps bounds
//! stop latency to a short tick.
//!
//! # Module structure
//!
//! - `config`: daemon configuration (file + environment)
//! - `frame`: RGB frame container, JPEG encode, resize
//! - `pipeline`: frame source/sink contracts and backends
//! - `sensor`: sensor snapshot, provider contract, thermal collaborators
//! - `state`: shared latest-frame and latest-snapshot state
//! - `overlay`: telemetry band compositing
//! - `snapshot`: date-partitioned still persistence
//! - `stream`: per-consumer multipart frame feed
//! - `daemon`: worker loops and lifecycle

pub mod config;
pub mod daemon;
pub mod frame;
pub mod overlay;
pub mod pipeline;
pub mod sensor;
pub mod shutdown;
pub mod snapshot;
pub mod state;
pub mod stream;

pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use frame::{Frame, JPEG_QUALITY};
pub use pipeline::{sink_for, source_for, FrameSink, FrameSource, SyntheticSink, SyntheticSource};
pub use sensor::{
    CpuThermal, SensorProvider, SensorSnapshot, StubSensor, SysfsThermal, VcgencmdThermal,
};
pub use shutdown::Shutdown;
pub use state::SharedState;
pub use stream::{FeedOptions, FrameFeed, MULTIPART_BOUNDARY, MULTIPART_MIME_TYPE};
