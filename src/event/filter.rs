//! Admission filters installed by awaitables on session inboxes

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::types::TimerEvent;

/// Boolean admission gate shared by every inbox kind.
///
/// A queue consults its filter at push time; a router consults `is_enabled`
/// when reconciling its subscription set.
pub trait AdmissionFilter<T>: Clone + Default + Send + Sync + 'static {
    /// Whether the filter admits this event right now.
    fn check(&self, event: &T) -> bool;

    /// Whether the filter admits anything at all.
    fn is_enabled(&self) -> bool;
}

/// Predicate-refined filter: an enabled flag plus an optional refinement
/// over the event payload.
///
/// A default-constructed filter is disabled and rejects everything, which is
/// what an inbox carries between awaits.
pub struct EventFilter<T> {
    enabled: bool,
    refinement: Option<Arc<dyn Fn(&T) -> bool + Send + Sync>>,
}

impl<T> EventFilter<T> {
    /// Disabled filter; rejects every event.
    pub fn new() -> Self {
        Self {
            enabled: false,
            refinement: None,
        }
    }

    /// Enabled filter with no refinement; admits every event.
    pub fn accept_all() -> Self {
        Self {
            enabled: true,
            refinement: None,
        }
    }

    /// Enabled filter admitting only events the predicate accepts.
    pub fn matching(refinement: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            enabled: true,
            refinement: Some(Arc::new(refinement)),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_refinement(&mut self, refinement: impl Fn(&T) -> bool + Send + Sync + 'static) {
        self.refinement = Some(Arc::new(refinement));
    }
}

impl<T: 'static> AdmissionFilter<T> for EventFilter<T> {
    fn check(&self, event: &T) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.refinement {
            Some(refinement) => refinement(event),
            None => true,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<T> Clone for EventFilter<T> {
    fn clone(&self) -> Self {
        Self {
            enabled: self.enabled,
            refinement: self.refinement.clone(),
        }
    }
}

impl<T> Default for EventFilter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("enabled", &self.enabled)
            .field("refined", &self.refinement.is_some())
            .finish()
    }
}

/// Deadline-bearing filter for the timer inbox.
///
/// Replaces the refinement predicate with a `due` instant: a tick is admitted
/// once the wall clock has reached the deadline. A filter with no deadline
/// admits every tick while enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerFilter {
    enabled: bool,
    due: Option<Instant>,
}

impl TimerFilter {
    /// Disabled filter; rejects every tick.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enabled filter admitting ticks at or after `due`.
    pub fn due_at(due: Instant) -> Self {
        Self {
            enabled: true,
            due: Some(due),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_due(&mut self, due: Instant) {
        self.due = Some(due);
    }

    /// Pending deadline, if any. The timer driver reads this during router
    /// reconciliation to schedule its next wakeup.
    pub fn due(&self) -> Option<Instant> {
        self.due
    }
}

impl AdmissionFilter<TimerEvent> for TimerFilter {
    fn check(&self, _event: &TimerEvent) -> bool {
        if !self.enabled {
            return false;
        }
        match self.due {
            Some(due) => Instant::now() >= due,
            None => true,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
