//! Deferred one-shot calls for pass boundaries.
//!
//! [`DeferredCalls`] holds four FIFO queues, one per boundary of the frame:
//! before and after the update pass, before and after the draw pass. Any
//! thread can enqueue through a cloned [`DeferredSender`]; the exclusive
//! systems in [`crate::systems::deferred`] drain a queue at its boundary and
//! run each call with full world access.
//!
//! Typical use is a worker thread finishing a load and scheduling the
//! resulting member's registration at the start of the next update:
//!
//! ```ignore
//! let sender = world.resource::<DeferredCalls>().sender();
//! std::thread::spawn(move || {
//!     let member = load_member();
//!     sender.defer(Boundary::UpdateStart, move |world, _time| {
//!         let _ = world.resource::<Scene>().register(member);
//!     });
//! });
//! ```

use bevy_ecs::prelude::*;
use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::resources::worldtime::WorldTime;

/// A call scheduled for a pass boundary.
pub type DeferredCall = Box<dyn FnOnce(&mut World, &WorldTime) + Send + 'static>;

/// Frame boundaries at which deferred calls run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    UpdateStart,
    UpdateEnd,
    DrawStart,
    DrawEnd,
}

impl Boundary {
    pub const ALL: [Boundary; 4] = [
        Boundary::UpdateStart,
        Boundary::UpdateEnd,
        Boundary::DrawStart,
        Boundary::DrawEnd,
    ];

    fn index(self) -> usize {
        match self {
            Boundary::UpdateStart => 0,
            Boundary::UpdateEnd => 1,
            Boundary::DrawStart => 2,
            Boundary::DrawEnd => 3,
        }
    }
}

/// Cloneable handle for enqueuing deferred calls from any thread.
#[derive(Clone)]
pub struct DeferredSender {
    tx: [Sender<DeferredCall>; 4],
}

impl DeferredSender {
    /// Enqueue `call` to run at the next `boundary`.
    ///
    /// Returns `false` if the owning [`DeferredCalls`] has been dropped.
    pub fn defer<F>(&self, boundary: Boundary, call: F) -> bool
    where
        F: FnOnce(&mut World, &WorldTime) + Send + 'static,
    {
        self.tx[boundary.index()].send(Box::new(call)).is_ok()
    }
}

/// Resource owning the four deferred-call queues.
#[derive(Resource)]
pub struct DeferredCalls {
    sender: DeferredSender,
    rx: [Receiver<DeferredCall>; 4],
}

impl Default for DeferredCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredCalls {
    pub fn new() -> Self {
        let (tx0, rx0) = unbounded();
        let (tx1, rx1) = unbounded();
        let (tx2, rx2) = unbounded();
        let (tx3, rx3) = unbounded();
        DeferredCalls {
            sender: DeferredSender {
                tx: [tx0, tx1, tx2, tx3],
            },
            rx: [rx0, rx1, rx2, rx3],
        }
    }

    pub fn sender(&self) -> DeferredSender {
        self.sender.clone()
    }

    /// Enqueue `call` to run at the next `boundary`.
    pub fn defer<F>(&self, boundary: Boundary, call: F)
    where
        F: FnOnce(&mut World, &WorldTime) + Send + 'static,
    {
        // Cannot fail: this resource owns the receiving end.
        let _ = self.sender.defer(boundary, call);
    }

    /// Number of calls waiting for `boundary`.
    pub fn pending(&self, boundary: Boundary) -> usize {
        self.rx[boundary.index()].len()
    }

    /// Take every call currently queued for `boundary`, in FIFO order.
    pub fn take(&self, boundary: Boundary) -> Vec<DeferredCall> {
        self.rx[boundary.index()].try_iter().collect()
    }
}
