//! Effects produced by state transitions

use crate::backend::{FollowUpRequest, SymptomReport};
use serde::Serialize;

/// How loudly a notice should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Toast-style message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Broadcast the new state to observers
    PublishState,

    /// `POST /symptom-check`
    RequestTriage { query: String },

    /// `POST /follow-up`
    RequestFollowUp { request: FollowUpRequest },

    /// `POST /find-doctors`
    LookupDoctors { specialization: String },

    /// `POST /save-report`
    SaveReport { report: Box<SymptomReport> },

    /// Show a notice to the user
    Notify(Notice),
}

impl Effect {
    pub fn notify(notice: Notice) -> Self {
        Effect::Notify(notice)
    }

    pub fn lookup_doctors(specialization: impl Into<String>) -> Self {
        Effect::LookupDoctors {
            specialization: specialization.into(),
        }
    }

    pub fn save_report(report: SymptomReport) -> Self {
        Effect::SaveReport {
            report: Box::new(report),
        }
    }
}
