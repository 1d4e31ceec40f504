//! Events that can occur in an intake conversation

use crate::backend::{DoctorRecord, FollowUpResponse, TriageResponse};
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    SubmitSymptoms {
        text: String,
    },
    SubmitReply {
        text: String,
    },
    NewConversation {
        conversation_id: String,
    },

    // Triage events
    TriageAnswered {
        conversation_id: String,
        response: TriageResponse,
        received_at: DateTime<Utc>,
    },
    TriageFailed {
        conversation_id: String,
        message: String,
    },

    // Follow-up events
    FollowUpAnswered {
        conversation_id: String,
        response: FollowUpResponse,
        received_at: DateTime<Utc>,
    },
    FollowUpFailed {
        conversation_id: String,
        message: String,
    },

    // Collaborator events
    DoctorsFound {
        conversation_id: String,
        specialization: String,
        doctors: Vec<DoctorRecord>,
    },
    DoctorLookupFailed {
        conversation_id: String,
        specialization: String,
        message: String,
    },
    ReportSaved {
        conversation_id: String,
    },
    ReportFailed {
        conversation_id: String,
        message: String,
    },
}

impl Event {
    /// Conversation a remote completion belongs to; `None` for user events
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Event::SubmitSymptoms { .. }
            | Event::SubmitReply { .. }
            | Event::NewConversation { .. } => None,
            Event::TriageAnswered { conversation_id, .. }
            | Event::TriageFailed { conversation_id, .. }
            | Event::FollowUpAnswered { conversation_id, .. }
            | Event::FollowUpFailed { conversation_id, .. }
            | Event::DoctorsFound { conversation_id, .. }
            | Event::DoctorLookupFailed { conversation_id, .. }
            | Event::ReportSaved { conversation_id }
            | Event::ReportFailed { conversation_id, .. } => Some(conversation_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::SubmitSymptoms { .. } => "submit_symptoms",
            Event::SubmitReply { .. } => "submit_reply",
            Event::NewConversation { .. } => "new_conversation",
            Event::TriageAnswered { .. } => "triage_answered",
            Event::TriageFailed { .. } => "triage_failed",
            Event::FollowUpAnswered { .. } => "follow_up_answered",
            Event::FollowUpFailed { .. } => "follow_up_failed",
            Event::DoctorsFound { .. } => "doctors_found",
            Event::DoctorLookupFailed { .. } => "doctor_lookup_failed",
            Event::ReportSaved { .. } => "report_saved",
            Event::ReportFailed { .. } => "report_failed",
        }
    }
}
