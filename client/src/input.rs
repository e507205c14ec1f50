//! Direction input: the shared slot the tick loop reads, and the
//! automated driver used when no human is steering.

use log::debug;
use rand::Rng;
use shared::Direction;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Single-slot, last-write-wins direction shared between input handling
/// and the tick loop. Writers overwrite, the tick thread reads once per
/// tick; at worst one tick sees a one-step-stale value.
#[derive(Clone, Default)]
pub struct DirectionHandle {
    slot: Arc<Mutex<Direction>>,
}

impl DirectionHandle {
    pub fn new() -> Self {
        DirectionHandle::default()
    }

    pub fn get(&self) -> Direction {
        *self.slot.lock().expect("direction lock poisoned")
    }

    pub fn set(&self, dx: f64, dy: f64) {
        *self.slot.lock().expect("direction lock poisoned") = Direction::new(dx, dy);
    }
}

/// Automated steering: re-rolls a random unit direction at a fixed
/// cadence, standing in for mouse input on headless clients.
pub struct Autopilot;

impl Autopilot {
    pub fn spawn(handle: DirectionHandle, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let (dx, dy) = {
                    let mut rng = rand::thread_rng();
                    let angle: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
                    (angle.cos(), angle.sin())
                };
                debug!("autopilot steering ({:.2}, {:.2})", dx, dy);
                handle.set(dx, dy);
            }
        })
    }
}
