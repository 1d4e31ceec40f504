//! Wire types for the triage API
//!
//! Every response field the service may omit is an `Option` or carries
//! `#[serde(default)]`; fallbacks are applied once, in the accessors here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fallback answer when the initial check comes back without one
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't understand that.";

/// Urgency label attached to every saved report
pub const DEFAULT_URGENCY: &str = "Low";

// ============================================================================
// Transcript
// ============================================================================

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry, serialized exactly as the service expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub message: String,
}

impl Turn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            message: message.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

// ============================================================================
// Initial check
// ============================================================================

/// Response from `POST /symptom-check`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub specialist: Option<String>,
    #[serde(default)]
    pub follow_up_question: Option<String>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub tests: Vec<String>,
}

impl TriageResponse {
    /// The answer text, or the generic fallback
    pub fn answer_or_fallback(&self) -> &str {
        non_blank(self.answer.as_deref()).unwrap_or(FALLBACK_ANSWER)
    }

    pub fn follow_up(&self) -> Option<&str> {
        non_blank(self.follow_up_question.as_deref())
    }

    pub fn specialist(&self) -> Option<&str> {
        non_blank(self.specialist.as_deref())
    }
}

// ============================================================================
// Follow-up
// ============================================================================

/// Body of `POST /follow-up`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub conversation: Vec<Turn>,
    pub count: u32,
    pub user_id: String,
    pub emergency_asked: bool,
}

/// Response from `POST /follow-up`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub follow_up_question: Option<String>,
    #[serde(default)]
    pub specialist: Option<String>,
    #[serde(default)]
    pub doctors: Option<Vec<DoctorRecord>>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub emergency_asked: Option<bool>,
    #[serde(default)]
    pub tests: Vec<String>,
}

impl FollowUpResponse {
    pub fn answer(&self) -> Option<&str> {
        non_blank(self.answer.as_deref())
    }

    pub fn follow_up(&self) -> Option<&str> {
        non_blank(self.follow_up_question.as_deref())
    }

    pub fn specialist(&self) -> Option<&str> {
        non_blank(self.specialist.as_deref())
    }
}

// ============================================================================
// Doctors
// ============================================================================

/// Slots keyed by `DD/MM/YYYY` date
pub type SlotMap = BTreeMap<String, Vec<String>>;

/// Doctor as returned by `/find-doctors` and `/follow-up`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specialization: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee: String,
    #[serde(default)]
    pub available_slots: SlotMap,
    #[serde(default)]
    pub booked_slots: SlotMap,
}

impl DoctorRecord {
    /// "City, State" with empty parts dropped
    pub fn location(&self) -> String {
        [self.city.as_str(), self.state.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorLookupRequest {
    pub specialization: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorLookupResponse {
    #[serde(default)]
    pub doctors: Vec<DoctorRecord>,
}

// ============================================================================
// Reports
// ============================================================================

/// Body of `POST /save-report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomReport {
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub symptoms: String,
    pub ai_suggestion: String,
    pub suggested_tests: Vec<String>,
    pub urgency: String,
    pub full_conversation: Vec<Turn>,
    pub phone: String,
}

/// A report as stored by the service and returned by `/get-reports`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_datetime")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub ai_suggestion: String,
    #[serde(default)]
    pub suggested_tests: Vec<String>,
    #[serde(default)]
    pub urgency: String,
    #[serde(default)]
    pub full_conversation: Vec<Turn>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportHistoryRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportHistoryResponse {
    #[serde(default)]
    pub reports: Vec<StoredReport>,
}

/// Generic `{status, message}` acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Appointments
// ============================================================================

/// Body of `POST /book-appointment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub user_name: String,
    pub phone: String,
    pub age: u32,
    pub location: String,
    pub doctor_name: String,
    pub specialization: String,
    pub date: String,
    pub time: String,
    pub amount: u32,
    pub contact: String,
}

/// A booked appointment as returned by `/get-user-appointments`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredAppointment {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub specialization: String,
    #[serde(default)]
    pub location: String,
    /// `DD/MM/YYYY`
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    /// Doctor's decision: Pending, Accepted or Rejected
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListResponse {
    #[serde(default)]
    pub appointments: Vec<StoredAppointment>,
}

/// Body of `PUT /reschedule-appointment/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: String,
    pub time: String,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Fees arrive as either strings or numbers depending on who created the profile
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Older reports were stored with naive timestamps; those are read as UTC
fn lenient_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
