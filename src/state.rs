//! Shared daemon state.
//!
//! Two pieces of state cross worker boundaries, and both live here:
//!
//! - the latest captured frame, guarded by a mutex that stays held for the
//!   whole of any processing read (resize/overlay/encode), so a concurrent
//!   publish can never tear the pixels out from under a reader;
//! - the latest sensor snapshot, an immutable value behind an
//!   `RwLock<Arc<..>>`. Writers swap the Arc, readers clone it. A reader
//!   always sees one complete snapshot from a single publish.
//!
//! Nothing else in the daemon is shared; the frame source and sink are owned
//! exclusively by the capture worker.

use std::sync::{Arc, Mutex, RwLock};

use crate::frame::Frame;
use crate::sensor::SensorSnapshot;

pub struct SharedState {
    frame: Mutex<Option<Frame>>,
    sensor: RwLock<Arc<SensorSnapshot>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            frame: Mutex::new(None),
            sensor: RwLock::new(Arc::new(SensorSnapshot::default())),
        }
    }

    /// Replace the latest frame. The buffer is either empty or holds a
    /// fully-formed frame; there is no partially-written state.
    pub fn publish_frame(&self, frame: Frame) {
        let mut latest = self.frame.lock().unwrap_or_else(|e| e.into_inner());
        *latest = Some(frame);
    }

    /// Clone the latest frame, or `None` if nothing has been published yet.
    pub fn read_frame(&self) -> Option<Frame> {
        let latest = self.frame.lock().unwrap_or_else(|e| e.into_inner());
        latest.clone()
    }

    /// Run `f` against the latest frame while the lock is held.
    ///
    /// Use this for reads that process pixels (resize/overlay/encode): the
    /// lock spans the whole processing step, so the underlying storage cannot
    /// be replaced mid-use.
    pub fn with_frame<R>(&self, f: impl FnOnce(&Frame) -> R) -> Option<R> {
        let latest = self.frame.lock().unwrap_or_else(|e| e.into_inner());
        latest.as_ref().map(f)
    }

    /// Swap in a new sensor snapshot.
    pub fn publish_sensor(&self, snapshot: SensorSnapshot) {
        let mut current = self.sensor.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(snapshot);
    }

    /// The latest sensor snapshot. Defaults to all-zero before the first poll.
    pub fn read_sensor(&self) -> Arc<SensorSnapshot> {
        let current = self.sensor.read().unwrap_or_else(|e| e.into_inner());
        current.clone()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn solid_frame(value: u8, seq: u64) -> Frame {
        Frame::from_raw(32, 24, vec![value; 32 * 24 * 3], seq).expect("valid buffer")
    }

    #[test]
    fn read_before_first_publish_is_none() {
        let state = SharedState::new();
        assert!(state.read_frame().is_none());
        assert!(state.with_frame(|_| ()).is_none());
    }

    #[test]
    fn latest_publish_wins() {
        let state = SharedState::new();
        state.publish_frame(solid_frame(1, 1));
        state.publish_frame(solid_frame(2, 2));
        let latest = state.read_frame().expect("published frame");
        assert_eq!(latest.seq(), 2);
    }

    #[test]
    fn concurrent_publish_never_tears_a_frame() {
        // Writers publish frames whose pixels are all one value; a torn read
        // would show a mix of values within a single frame.
        let state = Arc::new(SharedState::new());
        let stop = Arc::new(AtomicBool::new(false));

        let writer_state = state.clone();
        let writer_stop = stop.clone();
        let writer = std::thread::spawn(move || {
            let mut seq = 0u64;
            while !writer_stop.load(Ordering::SeqCst) {
                seq += 1;
                let value = (seq % 2 * 255) as u8;
                writer_state.publish_frame(solid_frame(value, seq));
            }
        });

        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) {
            if let Some(uniform) = state.with_frame(|frame| {
                let first = frame.raw_bytes()[0];
                frame.raw_bytes().iter().all(|&b| b == first)
            }) {
                assert!(uniform, "observed a torn frame");
            }
        }

        stop.store(true, Ordering::SeqCst);
        writer.join().expect("writer thread");
    }

    #[test]
    fn sensor_snapshot_fields_come_from_a_single_publish() {
        // Pressure is always derived from temperature by the writer; a torn
        // read would break that relation.
        let state = Arc::new(SharedState::new());
        let stop = Arc::new(AtomicBool::new(false));

        let writer_state = state.clone();
        let writer_stop = stop.clone();
        let writer = std::thread::spawn(move || {
            let mut cycle = 0.0f64;
            while !writer_stop.load(Ordering::SeqCst) {
                cycle += 1.0;
                writer_state.publish_sensor(SensorSnapshot::now(cycle, cycle * 2.0, cycle * 3.0));
            }
        });

        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) {
            let snapshot = state.read_sensor();
            if snapshot.temperature > 0.0 {
                assert_eq!(snapshot.pressure, snapshot.temperature * 2.0);
                assert_eq!(snapshot.cpu_temperature, snapshot.temperature * 3.0);
            }
        }

        stop.store(true, Ordering::SeqCst);
        writer.join().expect("writer thread");
    }
}
