//! Intake conversation state types

use crate::backend::{DoctorRecord, Turn};
use serde::{Deserialize, Serialize};

/// First assistant turn of every conversation
pub const GREETING: &str =
    "Hi! Describe your symptoms and I'll help you figure out what to do next.";

// ============================================================================
// Phase
// ============================================================================

/// Where the conversation is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// No symptoms submitted yet
    #[default]
    Idle,

    /// Initial symptoms sent, triage request in flight
    AwaitingInitialAnswer {
        /// The submitted symptom text, used as the report's symptoms if the
        /// triage service finalizes immediately
        query: String,
    },

    /// Waiting for the user to answer the pending follow-up question
    InFollowUp,

    /// Follow-up reply sent, request in flight
    AwaitingFollowUpAnswer {
        /// The reply being answered; the termination gate reads it
        reply: String,
    },

    /// Conversation concluded
    Finalized,
}

impl Phase {
    /// A request for the current turn is outstanding
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Phase::AwaitingInitialAnswer { .. } | Phase::AwaitingFollowUpAnswer { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingInitialAnswer { .. } => "awaiting_initial_answer",
            Phase::InFollowUp => "in_follow_up",
            Phase::AwaitingFollowUpAnswer { .. } => "awaiting_follow_up_answer",
            Phase::Finalized => "finalized",
        }
    }
}

// ============================================================================
// Pending answer state
// ============================================================================

/// Terminal suggestion shown once the conversation concludes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSuggestion {
    pub answer: String,
    pub tests: Vec<String>,
    pub specialist: Option<String>,
}

/// Derived answer state, overwritten every round
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PendingAnswer {
    pub answer: Option<String>,
    pub follow_up: Option<String>,
    pub specialist: Option<String>,
    pub doctors: Vec<DoctorRecord>,
    pub final_suggestion: Option<FinalSuggestion>,
}

// ============================================================================
// Intake state
// ============================================================================

/// Full controller state; `transition` produces a new one per event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeState {
    /// Identifies this conversation; responses tagged with another id are stale
    pub conversation_id: String,
    pub phase: Phase,
    pub transcript: Vec<Turn>,
    pub follow_up_count: u32,
    pub emergency_asked: bool,
    pub pending: PendingAnswer,
    /// Set when the save-report effect has been emitted for this conversation
    pub report_submitted: bool,
}

impl IntakeState {
    /// Fresh conversation holding only the greeting
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            phase: Phase::Idle,
            transcript: vec![Turn::assistant(GREETING)],
            follow_up_count: 0,
            emergency_asked: false,
            pending: PendingAnswer::default(),
            report_submitted: false,
        }
    }

    /// Text of the most recent user turn
    pub fn last_user_message(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|turn| turn.is_user())
            .map(|turn| turn.message.as_str())
    }

    /// Doctor results may be shown once the user has asked for them
    pub fn doctors_visible(&self) -> bool {
        super::policy::doctors_visible(&self.transcript)
    }
}

/// Session identity passed in at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeContext {
    pub user_id: String,
    pub phone: Option<String>,
}

impl IntakeContext {
    pub fn new(user_id: impl Into<String>, phone: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            phone,
        }
    }
}
