//! Daemon lifecycle and worker loops.
//!
//! [`Daemon`] owns the configuration, the shared state, and the handles of
//! three background workers:
//!
//! - capture: pulls frames from the source at the configured capture rate,
//!   overlays telemetry, publishes the latest frame, forwards a rate-limited
//!   subset to the sink;
//! - snapshot: persists the latest frame to a date-partitioned directory
//!   once per interval;
//! - sensor: polls the environmental sensor and host thermal reading.
//!
//! All three observe one shutdown signal per loop iteration. The frame
//! source and sink are owned exclusively by the capture worker, which
//! releases them in its epilogue; nothing else touches them, so release
//! happens exactly once no matter how `stop()` is called.
//!
//! No worker failure is fatal: transient read failures skip the cycle,
//! directory-creation failures retry next interval, sensor failures degrade
//! to zero readings. The capture loop ends only on source-closed or
//! shutdown.

use anyhow::{anyhow, Result};
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::DaemonConfig;
use crate::overlay;
use crate::pipeline::{FrameSink, FrameSource};
use crate::sensor::{CpuThermal, SensorProvider, SensorSnapshot};
use crate::shutdown::Shutdown;
use crate::snapshot;
use crate::state::SharedState;
use crate::stream::{FeedOptions, FrameFeed};

/// Sensor poll cadence.
const SENSOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Daemon {
    config: DaemonConfig,
    state: Arc<SharedState>,
    shutdown: Arc<Shutdown>,
    capture_live: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            state: Arc::new(SharedState::new()),
            shutdown: Arc::new(Shutdown::new()),
            capture_live: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Shared state handle, mainly for inspection in tests and embedders.
    pub fn state(&self) -> Arc<SharedState> {
        self.state.clone()
    }

    /// Handle for signal handlers: triggering it makes a blocked
    /// [`Daemon::run_until_shutdown`] return and `stop()` complete promptly.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// Launch the three workers. Callable at most once.
    ///
    /// The source must open; a sink that fails to open is logged and the
    /// stream output is simply absent (snapshots and feeds still work).
    pub fn start(
        &self,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
        sensor: Box<dyn SensorProvider>,
        thermal: Box<dyn CpuThermal>,
    ) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("daemon already started"));
        }

        source.open()?;
        if let Err(e) = sink.open(&self.config) {
            log::warn!("frame sink failed to open, streaming disabled: {}", e);
        }
        self.capture_live.store(true, Ordering::SeqCst);

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());

        let capture = {
            let state = self.state.clone();
            let shutdown = self.shutdown.clone();
            let live = self.capture_live.clone();
            let capture_fps = self.config.capture_fps;
            let stream_fps = self.config.stream_fps;
            std::thread::spawn(move || {
                run_capture(&state, &shutdown, &live, capture_fps, stream_fps, source, sink)
            })
        };

        let snapshot = {
            let state = self.state.clone();
            let shutdown = self.shutdown.clone();
            let capture_dir = self.config.capture_dir.clone();
            let interval = self.config.snapshot_interval;
            std::thread::spawn(move || run_snapshot(&state, &shutdown, &capture_dir, interval))
        };

        let sensor = {
            let state = self.state.clone();
            let shutdown = self.shutdown.clone();
            std::thread::spawn(move || run_sensor(&state, &shutdown, sensor, thermal))
        };

        workers.extend([capture, snapshot, sensor]);
        log::info!(
            "nestcam running: {}x{} capture, {} fps stream, snapshots every {}s to {}",
            self.config.width,
            self.config.height,
            self.config.stream_fps,
            self.config.snapshot_interval.as_secs(),
            self.config.capture_dir.display()
        );
        Ok(())
    }

    /// Open an independent multipart feed over the latest frame.
    pub fn feed(&self, options: FeedOptions) -> FrameFeed {
        FrameFeed::new(self.state.clone(), self.capture_live.clone(), options)
    }

    /// True while the capture worker is producing frames.
    pub fn is_capturing(&self) -> bool {
        self.capture_live.load(Ordering::SeqCst)
    }

    /// Block until the shutdown signal fires (e.g. from a signal handler).
    pub fn run_until_shutdown(&self) {
        self.shutdown.wait();
    }

    /// Signal shutdown and join every worker that was started.
    ///
    /// Idempotent, safe to call concurrently with itself or after `start`;
    /// late callers block until the first join finishes and then return.
    pub fn stop(&self) {
        self.shutdown.trigger();
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        for worker in workers.drain(..) {
            if worker.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.stop();
    }
}

// ----------------------------------------------------------------------------
// Worker loops
// ----------------------------------------------------------------------------

fn run_capture(
    state: &SharedState,
    shutdown: &Shutdown,
    capture_live: &AtomicBool,
    capture_fps: u32,
    stream_fps: u32,
    mut source: Box<dyn FrameSource>,
    mut sink: Box<dyn FrameSink>,
) {
    let frame_budget = Duration::from_secs_f64(1.0 / f64::from(capture_fps.max(1)));
    let forward_budget = Duration::from_secs_f64(1.0 / f64::from(stream_fps.max(1)));
    let mut last_forward: Option<Instant> = None;

    while !shutdown.is_triggered() && source.is_open() {
        let cycle_start = Instant::now();
        match source.read_frame() {
            Ok(Some(mut frame)) => {
                overlay::draw_telemetry(&mut frame, &state.read_sensor());

                if sink.is_open()
                    && last_forward.is_none_or(|at| at.elapsed() >= forward_budget)
                {
                    if let Err(e) = sink.write_frame(&frame) {
                        log::warn!("sink write failed: {}", e);
                    } else {
                        last_forward = Some(Instant::now());
                    }
                }

                state.publish_frame(frame);
            }
            Ok(None) => {}
            Err(e) => log::debug!("frame read failed: {}", e),
        }

        // A blocking source eats the budget in read_frame and sleeps ~0 here;
        // a non-blocking one is held to the configured capture rate.
        if !shutdown.sleep(frame_budget.saturating_sub(cycle_start.elapsed())) {
            break;
        }
    }

    source.release();
    sink.release();
    capture_live.store(false, Ordering::SeqCst);
    log::info!("capture worker stopped");
}

fn run_snapshot(
    state: &SharedState,
    shutdown: &Shutdown,
    capture_dir: &std::path::Path,
    interval: Duration,
) {
    while !shutdown.is_triggered() {
        let now = Local::now();
        if let Err(e) = snapshot::ensure_date_dir(capture_dir, &now) {
            // Non-fatal: the disk may come back; retry next interval.
            log::error!("cannot create capture dir: {}", e);
            if !shutdown.sleep(interval) {
                break;
            }
            continue;
        }

        let path = snapshot::snapshot_path(capture_dir, &now);
        match state.with_frame(|frame| snapshot::write_snapshot(&path, frame)) {
            Some(Ok(())) => log::info!("saved snapshot {}", path.display()),
            Some(Err(e)) => log::error!("snapshot failed: {}", e),
            None => log::debug!("no frame published yet, skipping snapshot"),
        }

        if !shutdown.sleep(interval) {
            break;
        }
    }
    log::info!("snapshot worker stopped");
}

fn run_sensor(
    state: &SharedState,
    shutdown: &Shutdown,
    mut sensor: Box<dyn SensorProvider>,
    mut thermal: Box<dyn CpuThermal>,
) {
    while !shutdown.is_triggered() {
        let temperature = sensor.read_temperature().unwrap_or_else(|e| {
            log::warn!("temperature read failed: {}", e);
            0.0
        });
        let pressure = sensor.read_pressure().unwrap_or_else(|e| {
            log::warn!("pressure read failed: {}", e);
            0.0
        });
        let cpu = thermal.read_celsius().unwrap_or_else(|e| {
            log::debug!("cpu thermal read failed: {}", e);
            0.0
        });

        state.publish_sensor(SensorSnapshot::now(temperature, pressure, cpu));

        if !shutdown.sleep(SENSOR_POLL_INTERVAL) {
            break;
        }
    }
    log::info!("sensor worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct ScriptedSensor {
        cycle: u32,
        fail_on: Option<u32>,
    }

    impl SensorProvider for ScriptedSensor {
        fn read_temperature(&mut self) -> Result<f64> {
            self.cycle += 1;
            if self.fail_on == Some(self.cycle) {
                return Err(anyhow!("bus timeout"));
            }
            Ok(f64::from(self.cycle))
        }

        fn read_pressure(&mut self) -> Result<f64> {
            if self.fail_on == Some(self.cycle) {
                return Err(anyhow!("bus timeout"));
            }
            Ok(f64::from(self.cycle) * 2.0)
        }
    }

    struct FixedThermal(f64);

    impl CpuThermal for FixedThermal {
        fn read_celsius(&mut self) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn sensor_worker_survives_a_failing_cycle() {
        let state = Arc::new(SharedState::new());
        let shutdown = Arc::new(Shutdown::new());

        let worker_state = state.clone();
        let worker_shutdown = shutdown.clone();
        let worker = std::thread::spawn(move || {
            run_sensor(
                &worker_state,
                &worker_shutdown,
                Box::new(ScriptedSensor {
                    cycle: 0,
                    fail_on: Some(2),
                }),
                Box::new(FixedThermal(40.0)),
            )
        });

        // Wait until the worker has moved past the failing second cycle.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = state.read_sensor();
            if snapshot.temperature >= 3.0 {
                break;
            }
            assert!(Instant::now() < deadline, "sensor worker stalled");
            std::thread::sleep(Duration::from_millis(20));
        }

        shutdown.trigger();
        worker.join().expect("sensor worker");

        let last = state.read_sensor();
        assert_eq!(last.pressure, last.temperature * 2.0);
        assert_eq!(last.cpu_temperature, 40.0);
        assert_eq!(last.humidity, 0.0);
    }

    #[test]
    fn sensor_failure_publishes_zero_defaults() {
        struct AlwaysFailing;
        impl SensorProvider for AlwaysFailing {
            fn read_temperature(&mut self) -> Result<f64> {
                Err(anyhow!("no sensor"))
            }
            fn read_pressure(&mut self) -> Result<f64> {
                Err(anyhow!("no sensor"))
            }
        }
        struct FailingThermal;
        impl CpuThermal for FailingThermal {
            fn read_celsius(&mut self) -> Result<f64> {
                Err(anyhow!("no vcgencmd"))
            }
        }

        let state = Arc::new(SharedState::new());
        let shutdown = Arc::new(Shutdown::new());

        let worker_state = state.clone();
        let worker_shutdown = shutdown.clone();
        let worker = std::thread::spawn(move || {
            run_sensor(
                &worker_state,
                &worker_shutdown,
                Box::new(AlwaysFailing),
                Box::new(FailingThermal),
            )
        });

        std::thread::sleep(Duration::from_millis(50));
        shutdown.trigger();
        worker.join().expect("sensor worker");

        let snapshot = state.read_sensor();
        assert_eq!(snapshot.temperature, 0.0);
        assert_eq!(snapshot.pressure, 0.0);
        assert_eq!(snapshot.cpu_temperature, 0.0);
    }
}
