//! Background updater member.
//!
//! [`BackgroundUpdater`] wraps another [`Updatable`] and runs its `update` on
//! a worker thread. Each tick it either launches a new run (copying the tick's
//! [`WorldTime`]) or, if the previous run is still busy, skips the tick. With
//! [`BackgroundUpdater::block_after`] the updater stops skipping after a
//! number of consecutive delayed ticks and waits for the worker instead.
//!
//! Failures of a run (an error or a panic on the worker) surface on the tick
//! that collects it, as that tick's `update` result.
//!
//! ```ignore
//! let pathfinding = Arc::new(Pathfinder::new());
//! let bg = Arc::new(BackgroundUpdater::new("pathfinding", pathfinding, 10).block_after(3));
//! scene.register_updatable(bg)?;
//! ```

use log::{debug, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crate::components::priority::Priority;
use crate::resources::worldtime::WorldTime;
use crate::scene::{MemberError, MemberResult, SceneMember, Updatable};

#[derive(Default)]
struct WorkerState {
    worker: Option<JoinHandle<MemberResult>>,
    /// Consecutive ticks skipped because the worker was busy.
    delayed_ticks: u32,
}

pub struct BackgroundUpdater {
    name: String,
    target: Arc<dyn Updatable>,
    priority: Priority,
    block_after: Option<u32>,
    state: Mutex<WorkerState>,
    launches: AtomicU64,
    blocks: AtomicU64,
}

impl BackgroundUpdater {
    pub fn new(name: impl Into<String>, target: Arc<dyn Updatable>, update_priority: i32) -> Self {
        BackgroundUpdater {
            name: name.into(),
            target,
            priority: Priority::new(update_priority),
            block_after: None,
            state: Mutex::new(WorkerState::default()),
            launches: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
        }
    }

    /// Wait for the worker once it has been busy for more than `ticks`
    /// consecutive ticks. `0` waits on every busy tick.
    pub fn block_after(mut self, ticks: u32) -> Self {
        self.block_after = Some(ticks);
        self
    }

    /// `true` while a worker run is in flight.
    pub fn is_busy(&self) -> bool {
        self.state
            .lock()
            .worker
            .as_ref()
            .is_some_and(|w| !w.is_finished())
    }

    /// Number of worker runs launched so far.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    /// Number of ticks that had to wait for a delayed worker.
    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Wait for any in-flight run and return its result.
    pub fn wait(&self) -> MemberResult {
        let worker = self.state.lock().worker.take();
        match worker {
            Some(worker) => join_worker(worker),
            None => Ok(()),
        }
    }

    fn launch(&self, state: &mut WorkerState, time: &WorldTime) -> MemberResult {
        let target = self.target.clone();
        let time = *time;
        let worker = thread::Builder::new()
            .name(format!("bg-{}", self.name))
            .spawn(move || target.update(&time))
            .map_err(|e| MemberError::new(format!("failed to spawn worker: {}", e)))?;
        state.worker = Some(worker);
        state.delayed_ticks = 0;
        self.launches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl SceneMember for BackgroundUpdater {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> MemberResult {
        self.target.initialize()
    }

    fn release(&self) -> MemberResult {
        let run = self.wait();
        let released = self.target.release();
        run.and(released)
    }
}

impl Updatable for BackgroundUpdater {
    fn enabled(&self) -> bool {
        self.target.enabled()
    }

    fn update_priority(&self) -> &Priority {
        &self.priority
    }

    fn update(&self, time: &WorldTime) -> MemberResult {
        let mut state = self.state.lock();
        if let Some(worker) = state.worker.take() {
            if worker.is_finished() {
                join_worker(worker)?;
            } else if self.block_after.is_some_and(|n| state.delayed_ticks >= n) {
                warn!(
                    "background '{}': worker delayed for {} tick(s), blocking",
                    self.name, state.delayed_ticks
                );
                self.blocks.fetch_add(1, Ordering::Relaxed);
                join_worker(worker)?;
            } else {
                state.delayed_ticks += 1;
                state.worker = Some(worker);
                debug!(
                    "background '{}': busy, skipping tick {}",
                    self.name, time.frame_count
                );
                return Ok(());
            }
        }
        self.launch(&mut state, time)
    }
}

fn join_worker(worker: JoinHandle<MemberResult>) -> MemberResult {
    worker
        .join()
        .map_err(|panic| MemberError::new(format!("worker panicked: {}", panic_message(&*panic))))?
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Receiver, Sender, bounded};
    use std::sync::atomic::AtomicBool;

    /// Updatable whose runs finish only when the test says so.
    struct Gated {
        enabled: AtomicBool,
        priority: Priority,
        go: Receiver<MemberResult>,
        runs: AtomicU64,
    }

    impl SceneMember for Gated {}

    impl Updatable for Gated {
        fn enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        fn update_priority(&self) -> &Priority {
            &self.priority
        }
        fn update(&self, _time: &WorldTime) -> MemberResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.go.recv().unwrap_or(Ok(()))
        }
    }

    fn gated() -> (Arc<Gated>, Sender<MemberResult>) {
        let (tx, rx) = bounded(16);
        let g = Arc::new(Gated {
            enabled: AtomicBool::new(true),
            priority: Priority::new(0),
            go: rx,
            runs: AtomicU64::new(0),
        });
        (g, tx)
    }

    #[test]
    fn test_skips_ticks_while_busy() {
        let (target, go) = gated();
        let bg = BackgroundUpdater::new("t", target.clone(), 0);
        let t = WorldTime::default();

        bg.update(&t).unwrap();
        bg.update(&t).unwrap();
        bg.update(&t).unwrap();
        assert_eq!(bg.launches(), 1);

        go.send(Ok(())).unwrap();
        bg.wait().unwrap();
        assert_eq!(target.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_relaunches_after_completion() {
        let (target, go) = gated();
        let bg = BackgroundUpdater::new("t", target.clone(), 0);
        let t = WorldTime::default();

        go.send(Ok(())).unwrap();
        bg.update(&t).unwrap();
        while bg.is_busy() {
            thread::yield_now();
        }
        go.send(Ok(())).unwrap();
        bg.update(&t).unwrap();
        assert_eq!(bg.launches(), 2);
        bg.wait().unwrap();
        assert_eq!(target.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_worker_error_surfaces_on_next_tick() {
        let (target, go) = gated();
        let bg = BackgroundUpdater::new("t", target, 0);
        let t = WorldTime::default();

        go.send(Err(MemberError::new("pathfinding failed"))).unwrap();
        bg.update(&t).unwrap();
        while bg.is_busy() {
            thread::yield_now();
        }
        let err = bg.update(&t).unwrap_err();
        assert_eq!(err.message(), "pathfinding failed");
    }

    #[test]
    fn test_blocks_after_configured_delay() {
        let (target, go) = gated();
        let bg = BackgroundUpdater::new("t", target.clone(), 0).block_after(2);
        let t = WorldTime::default();

        bg.update(&t).unwrap(); // launch
        bg.update(&t).unwrap(); // delayed 1
        bg.update(&t).unwrap(); // delayed 2
        assert_eq!(bg.blocks(), 0);

        // Next tick blocks on the first run, then launches a second one.
        let release = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            go.send(Ok(())).unwrap();
            go.send(Ok(())).unwrap();
        });
        bg.update(&t).unwrap();
        assert_eq!(bg.blocks(), 1);
        assert_eq!(bg.launches(), 2);
        bg.wait().unwrap();
        release.join().unwrap();
        assert_eq!(target.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_enabled_follows_target() {
        let (target, _go) = gated();
        let bg = BackgroundUpdater::new("t", target.clone(), 0);
        assert!(bg.enabled());
        target.enabled.store(false, Ordering::SeqCst);
        assert!(!bg.enabled());
    }

    #[test]
    fn test_release_joins_worker() {
        let (target, go) = gated();
        let bg = BackgroundUpdater::new("t", target, 0);
        bg.update(&WorldTime::default()).unwrap();
        go.send(Ok(())).unwrap();
        bg.release().unwrap();
        assert!(!bg.is_busy());
    }
}
