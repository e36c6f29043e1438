//! Transaction lifecycle states.
//!
//! A publish transaction only ever moves forward:
//! - NotStarted: begun, no workspace yet
//! - Open: workspace and changelist exist, puts are being staged
//! - Committing: submit in progress
//! - Committed / Aborted: terminal

use std::fmt;

/// Publish transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    NotStarted,
    Open,
    Committing,
    Committed,
    Aborted,
}

impl TransactionState {
    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }

    /// Check if `next` is a legal forward step from this state.
    pub fn can_advance_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (NotStarted, Open)
                | (NotStarted, Committing)
                | (NotStarted, Aborted)
                | (Open, Committing)
                | (Open, Aborted)
                | (Committing, Committed)
                | (Committing, Aborted)
        )
    }

    /// Get a human-readable description of this state.
    pub fn description(&self) -> &'static str {
        match self {
            TransactionState::NotStarted => "begun; nothing staged yet",
            TransactionState::Open => "workspace provisioned; staging files",
            TransactionState::Committing => "submitting the changelist",
            TransactionState::Committed => "submitted and cleaned up",
            TransactionState::Aborted => "abandoned and cleaned up",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::NotStarted => write!(f, "NOT STARTED"),
            TransactionState::Open => write!(f, "OPEN"),
            TransactionState::Committing => write!(f, "COMMITTING"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Parse a state from its display form.
impl std::str::FromStr for TransactionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace(['_', '-'], " ").as_str() {
            "NOT STARTED" | "NOTSTARTED" => Ok(TransactionState::NotStarted),
            "OPEN" => Ok(TransactionState::Open),
            "COMMITTING" => Ok(TransactionState::Committing),
            "COMMITTED" => Ok(TransactionState::Committed),
            "ABORTED" => Ok(TransactionState::Aborted),
            _ => Err(format!("unknown transaction state: {}", s)),
        }
    }
}
