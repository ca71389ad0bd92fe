//! Pending-transfer sessions, one per requester.

use std::fmt;

use dashmap::DashMap;
use linkrelay_fetch::Url;

use crate::error::PipelineError;

/// Opaque requester identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequesterId(pub i64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated link waiting for (or past) its name choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    pub requester: RequesterId,
    pub source_url: Url,
    pub suggested_name: String,
    /// Size reported by the server; not authoritative.
    pub declared_size: Option<u64>,
    chosen_name: Option<String>,
}

impl TransferSession {
    pub fn new(
        requester: RequesterId,
        source_url: Url,
        suggested_name: String,
        declared_size: Option<u64>,
    ) -> Self {
        Self {
            requester,
            source_url,
            suggested_name,
            declared_size,
            chosen_name: None,
        }
    }

    pub fn chosen_name(&self) -> Option<&str> {
        self.chosen_name.as_deref()
    }

    /// Sets the final name. Can only happen once.
    pub fn choose_name(&mut self, name: String) -> Result<(), PipelineError> {
        if self.chosen_name.is_some() {
            return Err(PipelineError::NameAlreadyChosen);
        }
        self.chosen_name = Some(name);
        Ok(())
    }

    /// A session is eligible for download once its name is fixed.
    pub fn is_ready(&self) -> bool {
        self.chosen_name.is_some()
    }
}

/// Concurrent session map keyed by requester.
///
/// Sharded, so distinct requesters never contend. `put` is last-write-wins.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<RequesterId, TransferSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session, discarding any previous one for the same requester.
    pub fn put(&self, session: TransferSession) {
        self.sessions.insert(session.requester, session);
    }

    pub fn get(&self, requester: RequesterId) -> Option<TransferSession> {
        self.sessions.get(&requester).map(|s| s.value().clone())
    }

    /// Removes the requester's session; returns whether one existed.
    pub fn delete(&self, requester: RequesterId) -> bool {
        self.sessions.remove(&requester).is_some()
    }

    /// Fixes the chosen name of an existing session and returns the updated copy.
    pub fn set_chosen_name(
        &self,
        requester: RequesterId,
        name: String,
    ) -> Result<TransferSession, PipelineError> {
        let mut entry = self
            .sessions
            .get_mut(&requester)
            .ok_or(PipelineError::SessionExpired)?;
        entry.choose_name(name)?;
        Ok(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
