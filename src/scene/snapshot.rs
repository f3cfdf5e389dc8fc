//! Serializable view of a scene's ordering, for debug overlays and dumps.

use serde::Serialize;

use super::member::{MemberId, SceneMember};
use super::sequence::{OrderSequence, Slot};
use super::Scene;

/// One slot of an order sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub id: MemberId,
    pub name: String,
    /// Key the slot is sorted by.
    pub priority: i32,
    /// Enabled flag for the update order, visible flag for the draw order.
    pub active: bool,
}

/// Point-in-time copy of both order sequences.
///
/// Each sequence is copied under its own lock, so the two lists are each
/// consistent but may straddle a concurrent registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneSnapshot {
    pub members: usize,
    pub update_order: Vec<SlotView>,
    pub draw_order: Vec<SlotView>,
}

impl SceneSnapshot {
    /// Member names in update order.
    pub fn update_names(&self) -> Vec<&str> {
        self.update_order.iter().map(|s| s.name.as_str()).collect()
    }

    /// Member names in draw order.
    pub fn draw_names(&self) -> Vec<&str> {
        self.draw_order.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to encode snapshot: {}", e))
    }
}

impl Scene {
    /// Copy the current update and draw orders.
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            members: self.len(),
            update_order: views(&*self.inner.updates, |m| m.enabled()),
            draw_order: views(&*self.inner.draws, |m| m.visible()),
        }
    }
}

fn views<T>(sequence: &OrderSequence<T>, active: impl Fn(&T) -> bool) -> Vec<SlotView>
where
    T: SceneMember + ?Sized,
{
    sequence
        .snapshot()
        .iter()
        .map(|slot: &Slot<T>| SlotView {
            id: slot.id,
            name: slot.member.name().to_string(),
            priority: slot.key,
            active: active(slot.member.as_ref()),
        })
        .collect()
}
