use tracing::debug;

/// Phases of one cascade execution. Strictly sequential within a query;
/// `Error` is reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Routing,
    Drafting,
    Validating,
    Accepted,
    Escalating,
    Verifying,
    Complete,
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Routing => "routing",
            Phase::Drafting => "drafting",
            Phase::Validating => "validating",
            Phase::Accepted => "accepted",
            Phase::Escalating => "escalating",
            Phase::Verifying => "verifying",
            Phase::Complete => "complete",
            Phase::Error => "error",
        };
        write!(f, "{}", name)
    }
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }

    pub fn can_advance_to(&self, next: Phase) -> bool {
        if next == Phase::Error {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Phase::Routing, Phase::Drafting)
                // DirectExpensive skips the draft entirely.
                | (Phase::Routing, Phase::Verifying)
                | (Phase::Drafting, Phase::Validating)
                // DirectCheap accepts without a validation pass.
                | (Phase::Drafting, Phase::Accepted)
                // Draft provider failure escalates without validating.
                | (Phase::Drafting, Phase::Escalating)
                | (Phase::Validating, Phase::Accepted)
                | (Phase::Validating, Phase::Escalating)
                | (Phase::Accepted, Phase::Complete)
                | (Phase::Escalating, Phase::Verifying)
                | (Phase::Verifying, Phase::Complete)
        )
    }
}

/// Tracks the current phase of an execution, logging each transition.
/// Illegal transitions are programming errors.
#[derive(Debug)]
pub struct PhaseTracker {
    query_id: String,
    current: Phase,
}

impl PhaseTracker {
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            current: Phase::Routing,
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal phase transition {} -> {}",
            self.current,
            next
        );
        debug!(query_id = %self.query_id, from = %self.current, to = %next, "phase transition");
        self.current = next;
    }
}
