//! Member capability traits and the registration descriptor.
//!
//! A member is any `Send + Sync` object shared through an [`Arc`]. It opts
//! into update dispatch by implementing [`Updatable`], into draw dispatch by
//! implementing [`Drawable`], and is handed to a scene through a
//! [`SceneEntry`] that states which of those capabilities the scene should
//! use.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::error::MemberResult;
use crate::components::priority::Priority;
use crate::resources::worldtime::WorldTime;

/// Scene-unique identifier returned by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle hooks shared by every member.
pub trait SceneMember: Send + Sync {
    /// Human-readable name used in logs, errors and snapshots.
    fn name(&self) -> &str {
        "member"
    }

    /// Called exactly once when the member is registered.
    fn initialize(&self) -> MemberResult {
        Ok(())
    }

    /// Called once when the member is unregistered or the scene is torn down.
    fn release(&self) -> MemberResult {
        Ok(())
    }
}

/// A member that takes part in the update pass.
pub trait Updatable: SceneMember {
    fn enabled(&self) -> bool;
    fn update_priority(&self) -> &Priority;
    fn update(&self, time: &WorldTime) -> MemberResult;
}

/// A member that takes part in the draw pass.
pub trait Drawable: SceneMember {
    fn visible(&self) -> bool;
    fn draw_priority(&self) -> &Priority;
    fn draw(&self, time: &WorldTime) -> MemberResult;
}

/// Registration descriptor: the member plus the capabilities the scene uses.
///
/// Prefer the typed constructors, which guarantee all handles point at the
/// same object. [`SceneEntry::from_parts`] is checked at registration.
#[derive(Clone)]
pub struct SceneEntry {
    pub(crate) member: Arc<dyn SceneMember>,
    pub(crate) update: Option<Arc<dyn Updatable>>,
    pub(crate) draw: Option<Arc<dyn Drawable>>,
}

impl SceneEntry {
    /// Update dispatch only.
    pub fn updatable<T: Updatable + 'static>(member: Arc<T>) -> Self {
        SceneEntry {
            update: Some(member.clone()),
            draw: None,
            member,
        }
    }

    /// Draw dispatch only.
    pub fn drawable<T: Drawable + 'static>(member: Arc<T>) -> Self {
        SceneEntry {
            update: None,
            draw: Some(member.clone()),
            member,
        }
    }

    /// Both update and draw dispatch.
    pub fn both<T: Updatable + Drawable + 'static>(member: Arc<T>) -> Self {
        SceneEntry {
            update: Some(member.clone()),
            draw: Some(member.clone()),
            member,
        }
    }

    /// Lifecycle only: initialized on registration and released on removal,
    /// never dispatched.
    pub fn passive<T: SceneMember + 'static>(member: Arc<T>) -> Self {
        SceneEntry {
            member,
            update: None,
            draw: None,
        }
    }

    /// Assemble an entry from separately erased handles.
    pub fn from_parts(
        member: Arc<dyn SceneMember>,
        update: Option<Arc<dyn Updatable>>,
        draw: Option<Arc<dyn Drawable>>,
    ) -> Self {
        SceneEntry {
            member,
            update,
            draw,
        }
    }

    pub fn name(&self) -> &str {
        self.member.name()
    }

    pub fn is_updatable(&self) -> bool {
        self.update.is_some()
    }

    pub fn is_drawable(&self) -> bool {
        self.draw.is_some()
    }

    /// Address of the shared allocation; the member's identity.
    pub(crate) fn identity(&self) -> usize {
        identity_of(&self.member)
    }

    /// `true` when every capability handle refers to the member object.
    pub(crate) fn is_consistent(&self) -> bool {
        let id = self.identity();
        self.update.as_ref().is_none_or(|u| identity_of(u) == id)
            && self.draw.as_ref().is_none_or(|d| identity_of(d) == id)
    }
}

impl fmt::Debug for SceneEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneEntry")
            .field("name", &self.name())
            .field("updatable", &self.is_updatable())
            .field("drawable", &self.is_drawable())
            .finish()
    }
}

/// Identity of a shared member, independent of the trait it is viewed through.
pub(crate) fn identity_of<T: ?Sized>(member: &Arc<T>) -> usize {
    Arc::as_ptr(member).cast::<()>() as usize
}
