//! Session registry
//!
//! Maps session identifiers to contexts, with idle expiry and a capacity
//! bound (least-recently-used eviction).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{FuqlError, Result};

use super::{Context, SessionId};

/// All live sessions
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Context>,

    /// Sessions unused for longer than this are dropped
    idle_timeout: Option<Duration>,

    /// Upper bound on live sessions
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Option<Duration>, capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Mint a new session and return its identifier
    pub fn create(&mut self, now: Instant) -> SessionId {
        self.evict_idle(now);
        while self.sessions.len() >= self.capacity {
            if !self.evict_least_recent() {
                break;
            }
        }

        let mut id = SessionId::generate();
        while self.sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        self.sessions.insert(id, Context::new(id, now));
        tracing::debug!("Created session {} ({} live)", id, self.sessions.len());
        id
    }

    /// Look a session up without touching it
    pub fn get(&self, id: &SessionId) -> Option<&Context> {
        self.sessions.get(id)
    }

    /// Look a session up and mark it as used
    ///
    /// A session that has been idle past the timeout is removed and reported
    /// as invalid, even if the periodic sweep has not reached it yet.
    pub fn get_mut(&mut self, id: &SessionId, now: Instant) -> Result<&mut Context> {
        let expired = match self.sessions.get(id) {
            None => return Err(FuqlError::InvalidSession(format!("unknown session {}", id))),
            Some(context) => self.is_expired(context, now),
        };
        if expired {
            self.sessions.remove(id);
            return Err(FuqlError::InvalidSession(format!("session {} expired", id)));
        }

        let context = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| FuqlError::InvalidSession(format!("unknown session {}", id)))?;
        context.touch(now);
        Ok(context)
    }

    /// Every context, for index maintenance after structural deletes
    pub fn contexts_mut(&mut self) -> impl Iterator<Item = &mut Context> {
        self.sessions.values_mut()
    }

    /// Drop sessions idle past the timeout, returning how many were removed
    pub fn evict_idle(&mut self, now: Instant) -> usize {
        let Some(timeout) = self.idle_timeout else {
            return 0;
        };
        let before = self.sessions.len();
        self.sessions
            .retain(|_, context| now.saturating_duration_since(context.last_seen()) <= timeout);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    fn is_expired(&self, context: &Context, now: Instant) -> bool {
        self.idle_timeout
            .map(|timeout| now.saturating_duration_since(context.last_seen()) > timeout)
            .unwrap_or(false)
    }

    fn evict_least_recent(&mut self) -> bool {
        let oldest = self
            .sessions
            .values()
            .min_by_key(|context| context.last_seen())
            .map(|context| context.id());
        match oldest {
            Some(id) => {
                tracing::debug!("Session capacity reached, evicting {}", id);
                self.sessions.remove(&id);
                true
            }
            None => false,
        }
    }
}
