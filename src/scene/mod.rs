//! Ordered scene container.
//!
//! A [`Scene`] owns a set of members and keeps two views over them sorted at
//! all times: the update order (by [`Updatable::update_priority`]) and the
//! draw order (by [`Drawable::draw_priority`]). Members are placed with a
//! short-circuited binary insertion when registered and relocated in place
//! when one of their priorities changes, so the collection is never resorted
//! wholesale.
//!
//! # Responsibilities
//!
//! - membership: [`Scene::register`] / [`Scene::unregister`] and friends
//! - ordering: one [`OrderSequence`](sequence) per pass, each behind its own lock
//! - reordering: an observer installed in each [`Priority`] cell
//! - dispatch: [`Scene::update`] and [`Scene::draw`], once per tick
//!
//! # Threading
//!
//! `Scene` is a cheap handle around shared state. Clone it into worker
//! threads to register or unregister members while the game loop
//! dispatches. Passes iterate a copy of their sequence, so member callbacks
//! run without any scene lock held and may freely touch the scene; such
//! changes are seen by the next pass.
//!
//! # Failures
//!
//! A failing member callback aborts the current pass and is returned to the
//! caller as [`SceneError::Member`]. There is no per-member isolation.
//! [`Scene::clear`] is the exception: it releases every member and reports
//! all release failures together.
//!
//! [`Priority`]: crate::components::priority::Priority

mod error;
mod member;
mod sequence;
mod snapshot;

pub use error::{MemberError, MemberFailure, MemberResult, Phase, SceneError};
pub use member::{Drawable, MemberId, SceneEntry, SceneMember, Updatable};
pub use snapshot::{SceneSnapshot, SlotView};

use bevy_ecs::prelude::Resource;
use log::{debug, trace, warn};
use parking_lot::{Mutex, ReentrantMutex};
use rustc_hash::FxHashMap;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::components::priority::PriorityObserver;
use crate::resources::worldtime::WorldTime;
use member::identity_of;
use sequence::OrderSequence;

/// Where a registered member is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Initializing,
    Live,
    /// Unregistered while still initializing; the registering call releases it.
    Detached,
    /// `initialize` failed; the member is never released.
    Failed,
}

/// Reentrant so a member may unregister itself from inside `initialize`.
type Lifecycle = ReentrantMutex<Cell<Stage>>;

struct Registration {
    entry: SceneEntry,
    lifecycle: Arc<Lifecycle>,
}

impl Registration {
    /// Release a detached member, unless its `initialize` is still running
    /// or has failed.
    fn release(&self, id: MemberId) -> Result<(), SceneError> {
        let stage = self.lifecycle.lock();
        match stage.get() {
            Stage::Live => release(id, &self.entry),
            Stage::Initializing => {
                stage.set(Stage::Detached);
                Ok(())
            }
            Stage::Detached | Stage::Failed => Ok(()),
        }
    }
}

#[derive(Default)]
struct Membership {
    by_id: FxHashMap<MemberId, Registration>,
    by_identity: FxHashMap<usize, MemberId>,
}

struct SceneInner {
    membership: Mutex<Membership>,
    updates: Arc<OrderSequence<dyn Updatable>>,
    draws: Arc<OrderSequence<dyn Drawable>>,
    next_id: AtomicU64,
}

/// Shared handle to an ordered collection of scene members.
#[derive(Resource, Clone)]
pub struct Scene {
    inner: Arc<SceneInner>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Scene {
            inner: Arc::new(SceneInner {
                membership: Mutex::new(Membership::default()),
                updates: Arc::new(OrderSequence::new(update_key)),
                draws: Arc::new(OrderSequence::new(draw_key)),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    // ---------------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------------

    /// Register a member that is both updated and drawn.
    pub fn register<T: Updatable + Drawable + 'static>(
        &self,
        member: Arc<T>,
    ) -> Result<MemberId, SceneError> {
        self.register_entry(SceneEntry::both(member))
    }

    /// Register a member that only takes part in the update pass.
    pub fn register_updatable<T: Updatable + 'static>(
        &self,
        member: Arc<T>,
    ) -> Result<MemberId, SceneError> {
        self.register_entry(SceneEntry::updatable(member))
    }

    /// Register a member that only takes part in the draw pass.
    pub fn register_drawable<T: Drawable + 'static>(
        &self,
        member: Arc<T>,
    ) -> Result<MemberId, SceneError> {
        self.register_entry(SceneEntry::drawable(member))
    }

    /// Register a member that is initialized and released but never dispatched.
    pub fn register_passive<T: SceneMember + 'static>(
        &self,
        member: Arc<T>,
    ) -> Result<MemberId, SceneError> {
        self.register_entry(SceneEntry::passive(member))
    }

    /// Register a member described by `entry`.
    ///
    /// The member is recorded, placed in the sequences it subscribes to, its
    /// priority cells start notifying this scene, and finally its
    /// `initialize` hook runs. If `initialize` fails the registration is
    /// rolled back (without calling `release`) and the failure returned.
    ///
    /// Recording and placement happen as one step with respect to
    /// [`Scene::unregister`] and [`Scene::clear`] on other threads. A
    /// concurrent unregistration of the member waits for `initialize` to
    /// return before releasing it.
    ///
    /// # Errors
    ///
    /// - [`SceneError::MismatchedCapabilities`] if the entry's handles do not
    ///   point at one object
    /// - [`SceneError::AlreadyRegistered`] if the member is already here
    /// - [`SceneError::PriorityObserved`] if a priority cell belongs to
    ///   another scene
    /// - [`SceneError::Member`] if `initialize` fails
    pub fn register_entry(&self, entry: SceneEntry) -> Result<MemberId, SceneError> {
        if !entry.is_consistent() {
            return Err(SceneError::MismatchedCapabilities(entry.name().to_string()));
        }

        let lifecycle = Arc::new(Lifecycle::new(Cell::new(Stage::Initializing)));
        // Held until `initialize` returns: a concurrent unregister waits here
        // before releasing, so `release` never overtakes `initialize`.
        let stage = lifecycle.lock();
        let id = self.inner.attach(&entry, &lifecycle)?;

        debug!(
            "scene: registered {} '{}' (update={:?}, draw={:?})",
            id,
            entry.name(),
            entry.update.as_ref().map(|u| u.update_priority().get()),
            entry.draw.as_ref().map(|d| d.draw_priority().get()),
        );

        match entry.member.initialize() {
            Ok(()) => {
                // The member unregistered itself from inside `initialize`.
                if stage.replace(Stage::Live) == Stage::Detached {
                    drop(stage);
                    release(id, &entry)?;
                }
                Ok(id)
            }
            Err(source) => {
                stage.set(Stage::Failed);
                drop(stage);
                self.inner.detach(id);
                warn!("scene: {} '{}' failed to initialize: {}", id, entry.name(), source);
                Err(MemberFailure {
                    id,
                    name: entry.name().to_string(),
                    phase: Phase::Initialize,
                    source,
                }
                .into())
            }
        }
    }

    /// Unregister `member` if it belongs to this scene.
    ///
    /// Returns `Ok(false)` without side effects when it is not registered.
    /// A `release` failure is reported after the member has been removed.
    pub fn unregister<T: ?Sized>(&self, member: &Arc<T>) -> Result<bool, SceneError> {
        match self.id_of(member) {
            Some(id) => self.unregister_id(id),
            None => Ok(false),
        }
    }

    /// Unregister the member registered as `id`. See [`Scene::unregister`].
    pub fn unregister_id(&self, id: MemberId) -> Result<bool, SceneError> {
        let Some(registration) = self.inner.detach(id) else {
            return Ok(false);
        };
        debug!("scene: unregistered {} '{}'", id, registration.entry.name());
        registration.release(id)?;
        Ok(true)
    }

    /// Unregister every member, releasing each in registration order.
    ///
    /// All members are removed even when some fail to release; the failures
    /// are returned together as [`SceneError::Teardown`].
    pub fn clear(&self) -> Result<(), SceneError> {
        self.inner.clear()
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Run one update pass over every enabled member, lowest priority first.
    pub fn update(&self, time: &WorldTime) -> Result<(), SceneError> {
        for slot in self.inner.updates.snapshot() {
            if !slot.member.enabled() {
                continue;
            }
            slot.member
                .update(time)
                .map_err(|source| MemberFailure {
                    id: slot.id,
                    name: slot.member.name().to_string(),
                    phase: Phase::Update,
                    source,
                })?;
        }
        Ok(())
    }

    /// Run one draw pass over every visible member, lowest priority first.
    pub fn draw(&self, time: &WorldTime) -> Result<(), SceneError> {
        for slot in self.inner.draws.snapshot() {
            if !slot.member.visible() {
                continue;
            }
            slot.member
                .draw(time)
                .map_err(|source| MemberFailure {
                    id: slot.id,
                    name: slot.member.name().to_string(),
                    phase: Phase::Draw,
                    source,
                })?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.inner.membership.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id under which `member` is registered, if any.
    pub fn id_of<T: ?Sized>(&self, member: &Arc<T>) -> Option<MemberId> {
        self.inner
            .membership
            .lock()
            .by_identity
            .get(&identity_of(member))
            .copied()
    }

    pub fn contains<T: ?Sized>(&self, member: &Arc<T>) -> bool {
        self.id_of(member).is_some()
    }

    pub fn contains_id(&self, id: MemberId) -> bool {
        self.inner.membership.lock().by_id.contains_key(&id)
    }

    /// Ids in update order.
    pub fn update_order(&self) -> Vec<MemberId> {
        self.inner.updates.ids()
    }

    /// Ids in draw order.
    pub fn draw_order(&self) -> Vec<MemberId> {
        self.inner.draws.ids()
    }

    /// Number of members in the update sequence.
    pub fn updatable_count(&self) -> usize {
        self.inner.updates.len()
    }

    /// Number of members in the draw sequence.
    pub fn drawable_count(&self) -> usize {
        self.inner.draws.len()
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("members", &self.len())
            .field("update_order", &self.update_order())
            .field("draw_order", &self.draw_order())
            .finish()
    }
}

impl SceneInner {
    /// Record `entry` and place it in the sequences it subscribes to.
    ///
    /// Runs entirely under the membership lock (membership, then sequence,
    /// then priority cell), so `detach` and `drain` see a member either fully
    /// attached or not at all.
    fn attach(&self, entry: &SceneEntry, lifecycle: &Arc<Lifecycle>) -> Result<MemberId, SceneError> {
        let mut membership = self.membership.lock();
        if let Some(existing) = membership.by_identity.get(&entry.identity()) {
            return Err(SceneError::AlreadyRegistered(*existing));
        }
        let id = MemberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        if let Some(u) = &entry.update {
            let observer = relocation_observer(&self.updates, id, "update");
            let admitted = self
                .updates
                .insert_if(id, u.clone(), |m| m.update_priority().try_observe(observer));
            if !admitted {
                return Err(priority_observed(entry, "update"));
            }
        }
        if let Some(d) = &entry.draw {
            let observer = relocation_observer(&self.draws, id, "draw");
            let admitted = self
                .draws
                .insert_if(id, d.clone(), |m| m.draw_priority().try_observe(observer));
            if !admitted {
                if let Some(u) = self.updates.remove(id) {
                    u.update_priority().clear_observer();
                }
                return Err(priority_observed(entry, "draw"));
            }
        }

        membership.by_identity.insert(entry.identity(), id);
        membership.by_id.insert(
            id,
            Registration {
                entry: entry.clone(),
                lifecycle: lifecycle.clone(),
            },
        );
        Ok(id)
    }

    /// Remove `id` from the membership and both sequences, silencing its
    /// priority cells. Does not call `release`.
    fn detach(&self, id: MemberId) -> Option<Registration> {
        let mut membership = self.membership.lock();
        let registration = membership.by_id.remove(&id)?;
        membership.by_identity.remove(&registration.entry.identity());
        self.unsubscribe(id);
        Some(registration)
    }

    /// Detach every member at once, in registration order.
    fn drain(&self) -> Vec<(MemberId, Registration)> {
        let mut membership = self.membership.lock();
        membership.by_identity.clear();
        let mut drained: Vec<_> = membership.by_id.drain().collect();
        drained.sort_unstable_by_key(|(id, _)| *id);
        for (id, _) in &drained {
            self.unsubscribe(*id);
        }
        drained
    }

    // A member sits in a sequence exactly when this scene's observer was
    // admitted into the matching cell, so only those cells are cleared.
    fn unsubscribe(&self, id: MemberId) {
        if let Some(u) = self.updates.remove(id) {
            u.update_priority().clear_observer();
        }
        if let Some(d) = self.draws.remove(id) {
            d.draw_priority().clear_observer();
        }
    }

    fn clear(&self) -> Result<(), SceneError> {
        let mut failures = Vec::new();
        for (id, registration) in self.drain() {
            if let Err(SceneError::Member(failure)) = registration.release(id) {
                failures.push(failure);
            }
        }

        if failures.is_empty() {
            debug!("scene: cleared");
            Ok(())
        } else {
            Err(SceneError::Teardown(failures))
        }
    }
}

impl Drop for SceneInner {
    fn drop(&mut self) {
        if let Err(e) = self.clear() {
            for failure in e.failures() {
                log::error!("scene: {}", failure);
            }
        }
    }
}

fn update_key(member: &(dyn Updatable + 'static)) -> i32 {
    member.update_priority().get()
}

fn draw_key(member: &(dyn Drawable + 'static)) -> i32 {
    member.draw_priority().get()
}

fn release(id: MemberId, entry: &SceneEntry) -> Result<(), SceneError> {
    entry.member.release().map_err(|source| {
        SceneError::Member(MemberFailure {
            id,
            name: entry.name().to_string(),
            phase: Phase::Release,
            source,
        })
    })
}

fn priority_observed(entry: &SceneEntry, which: &'static str) -> SceneError {
    SceneError::PriorityObserved {
        name: entry.name().to_string(),
        which,
    }
}

/// Observer that relocates `id` in `sequence` when its priority changes.
fn relocation_observer<T: ?Sized + Send + Sync + 'static>(
    sequence: &Arc<OrderSequence<T>>,
    id: MemberId,
    which: &'static str,
) -> PriorityObserver {
    let sequence = Arc::downgrade(sequence);
    Arc::new(move || {
        if let Some(sequence) = sequence.upgrade() {
            if sequence.relocate(id) {
                trace!("scene: relocated {} in {} order", id, which);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::priority::Priority;
    use std::sync::atomic::AtomicBool;

    struct Tracker {
        name: &'static str,
        enabled: AtomicBool,
        update: Priority,
        draw: Priority,
    }

    impl Tracker {
        fn new(name: &'static str, update: i32, draw: i32) -> Arc<Self> {
            Arc::new(Tracker {
                name,
                enabled: AtomicBool::new(true),
                update: Priority::new(update),
                draw: Priority::new(draw),
            })
        }
    }

    impl SceneMember for Tracker {
        fn name(&self) -> &str {
            self.name
        }
    }

    impl Updatable for Tracker {
        fn enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        fn update_priority(&self) -> &Priority {
            &self.update
        }
        fn update(&self, _time: &WorldTime) -> MemberResult {
            Ok(())
        }
    }

    impl Drawable for Tracker {
        fn visible(&self) -> bool {
            true
        }
        fn draw_priority(&self) -> &Priority {
            &self.draw
        }
        fn draw(&self, _time: &WorldTime) -> MemberResult {
            Ok(())
        }
    }

    #[test]
    fn test_ids_are_sequential() {
        let scene = Scene::new();
        let a = scene.register(Tracker::new("a", 0, 0)).unwrap();
        let b = scene.register(Tracker::new("b", 0, 0)).unwrap();
        assert_eq!(a, MemberId(0));
        assert_eq!(b, MemberId(1));
    }

    #[test]
    fn test_unregister_silences_priority() {
        let scene = Scene::new();
        let p = Tracker::new("p", 1, 1);
        scene.register(p.clone()).unwrap();
        assert!(p.update.is_observed());
        assert!(scene.unregister(&p).unwrap());
        assert!(!p.update.is_observed());
        assert!(!p.draw.is_observed());
    }

    #[test]
    fn test_mismatched_entry_is_rejected() {
        let scene = Scene::new();
        let a = Tracker::new("a", 0, 0);
        let b = Tracker::new("b", 0, 0);
        let entry = SceneEntry::from_parts(a.clone(), Some(b.clone()), None);
        assert_eq!(
            scene.register_entry(entry),
            Err(SceneError::MismatchedCapabilities("a".into()))
        );
        assert!(scene.is_empty());
        assert!(!b.update.is_observed());
    }

    #[test]
    fn test_member_in_two_scenes_is_rejected() {
        let first = Scene::new();
        let second = Scene::new();
        let p = Tracker::new("p", 0, 0);
        first.register(p.clone()).unwrap();
        let err = second.register(p.clone()).unwrap_err();
        assert!(matches!(
            err,
            SceneError::PriorityObserved { which: "update", .. }
        ));
        assert!(second.is_empty());
        // The first scene still tracks it.
        p.update.set(9);
        assert!(first.contains(&p));
        assert!(p.update.is_observed());
    }

    #[test]
    fn test_dropping_last_handle_releases_members() {
        struct Tracked(Arc<AtomicBool>);
        impl SceneMember for Tracked {
            fn release(&self) -> MemberResult {
                self.0.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
        let released = Arc::new(AtomicBool::new(false));
        {
            let scene = Scene::new();
            scene
                .register_passive(Arc::new(Tracked(released.clone())))
                .unwrap();
            let _other = scene.clone();
        }
        assert!(released.load(Ordering::SeqCst));
    }
}
