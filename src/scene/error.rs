//! Error types for scene registration, dispatch and teardown.

use std::fmt;
use thiserror::Error;

use super::member::MemberId;

/// Failure reported by a member callback (`initialize`, `update`, `draw`,
/// `release`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MemberError {
    message: String,
}

impl MemberError {
    pub fn new(message: impl Into<String>) -> Self {
        MemberError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for MemberError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for MemberError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result type returned by member callbacks.
pub type MemberResult = Result<(), MemberError>;

/// Which member callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initialize,
    Update,
    Draw,
    Release,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Initialize => "initialize",
            Phase::Update => "update",
            Phase::Draw => "draw",
            Phase::Release => "release",
        };
        f.write_str(s)
    }
}

/// A member callback failure, tagged with the member that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("member {id} ({name}) failed during {phase}: {source}")]
pub struct MemberFailure {
    pub id: MemberId,
    pub name: String,
    pub phase: Phase,
    #[source]
    pub source: MemberError,
}

/// Errors surfaced by [`Scene`](super::Scene) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// The same member reference is already registered in this scene.
    #[error("member is already registered as {0}")]
    AlreadyRegistered(MemberId),
    /// A priority cell of the member is already observed by another scene.
    #[error("{which} priority of member '{name}' is already observed by another scene")]
    PriorityObserved { name: String, which: &'static str },
    /// The capability handles of a [`SceneEntry`](super::SceneEntry) do not
    /// refer to the member object.
    #[error("capability handles of member '{0}' do not point at the member")]
    MismatchedCapabilities(String),
    /// A member callback failed; the current operation was aborted.
    #[error(transparent)]
    Member(#[from] MemberFailure),
    /// One or more members failed to release during teardown.
    #[error("{} member(s) failed to release during teardown", .0.len())]
    Teardown(Vec<MemberFailure>),
}

impl SceneError {
    /// Failures carried by this error, if any.
    pub fn failures(&self) -> &[MemberFailure] {
        match self {
            SceneError::Member(f) => std::slice::from_ref(f),
            SceneError::Teardown(v) => v,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_failure_display() {
        let f = MemberFailure {
            id: MemberId(3),
            name: "ship".into(),
            phase: Phase::Update,
            source: MemberError::new("boom"),
        };
        assert_eq!(
            f.to_string(),
            "member #3 (ship) failed during update: boom"
        );
    }

    #[test]
    fn test_teardown_lists_failures() {
        let f = MemberFailure {
            id: MemberId(1),
            name: "a".into(),
            phase: Phase::Release,
            source: "x".into(),
        };
        let e = SceneError::Teardown(vec![f.clone(), f]);
        assert_eq!(e.failures().len(), 2);
        assert_eq!(
            e.to_string(),
            "2 member(s) failed to release during teardown"
        );
    }
}
