//! Pure state transition function

use super::policy::{is_affirmative, is_recent_echo};
use super::state::FinalSuggestion;
use super::{Effect, Event, IntakeContext, IntakeState, Notice, Phase};
use crate::backend::{
    FollowUpRequest, FollowUpResponse, SymptomReport, TriageResponse, Turn, DEFAULT_URGENCY,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Assistant turn appended when the initial check fails
pub const TRIAGE_FAILURE_NOTICE: &str =
    "Sorry, I couldn't check your symptoms right now. Please try again.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: IntakeState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: IntakeState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Please describe your symptoms.")]
    EmptyInput,
    #[error("Still waiting for the previous answer, please hold on")]
    RequestInFlight,
    #[error("This conversation is finished; start a new one to continue")]
    ConversationFinished,
    #[error("Response belongs to an earlier conversation")]
    StaleResponse,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Errors the user caused and should be told about
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, TransitionError::StaleResponse)
    }
}

/// Pure transition function
///
/// Given the same inputs this always produces the same outputs; timestamps
/// and conversation ids arrive inside events.
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &IntakeState,
    context: &IntakeContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if let Some(id) = event.conversation_id() {
        if id != state.conversation_id {
            return Err(TransitionError::StaleResponse);
        }
    }

    match (&state.phase, event) {
        // ============================================================
        // New conversation: valid from anywhere
        // ============================================================
        (_, Event::NewConversation { conversation_id }) => {
            Ok(TransitionResult::new(IntakeState::new(conversation_id))
                .with_effect(Effect::PublishState))
        }

        // ============================================================
        // User submissions
        // ============================================================
        (_, Event::SubmitSymptoms { text } | Event::SubmitReply { text })
            if text.trim().is_empty() =>
        {
            Err(TransitionError::EmptyInput)
        }

        (phase, Event::SubmitSymptoms { .. } | Event::SubmitReply { .. })
            if phase.is_in_flight() =>
        {
            Err(TransitionError::RequestInFlight)
        }

        (Phase::Finalized, Event::SubmitSymptoms { .. } | Event::SubmitReply { .. }) => {
            Err(TransitionError::ConversationFinished)
        }

        // Idle + SubmitSymptoms -> AwaitingInitialAnswer
        (Phase::Idle, Event::SubmitSymptoms { text }) => {
            let query = text.trim().to_string();
            let mut next = state.clone();
            next.transcript.push(Turn::user(&query));
            next.phase = Phase::AwaitingInitialAnswer {
                query: query.clone(),
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::RequestTriage { query }))
        }

        (Phase::InFollowUp, Event::SubmitSymptoms { .. }) => Err(
            TransitionError::InvalidTransition(
                "a follow-up question is pending; answer it or start a new conversation"
                    .to_string(),
            ),
        ),

        // InFollowUp + SubmitReply -> AwaitingFollowUpAnswer
        (Phase::InFollowUp, Event::SubmitReply { text }) => {
            let reply = text.trim().to_string();
            let mut next = state.clone();
            // Appended before the request is built so the service sees it
            next.transcript.push(Turn::user(&reply));
            let request = FollowUpRequest {
                conversation: next.transcript.clone(),
                count: next.follow_up_count,
                user_id: context.user_id.clone(),
                emergency_asked: next.emergency_asked,
            };
            next.phase = Phase::AwaitingFollowUpAnswer { reply };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::RequestFollowUp { request }))
        }

        (Phase::Idle, Event::SubmitReply { .. }) => Err(TransitionError::InvalidTransition(
            "no follow-up question is pending; describe your symptoms first".to_string(),
        )),

        // ============================================================
        // Triage responses
        // ============================================================
        (
            Phase::AwaitingInitialAnswer { query },
            Event::TriageAnswered {
                response,
                received_at,
                ..
            },
        ) => Ok(apply_triage_answer(state, context, query, &response, received_at)),

        (Phase::AwaitingInitialAnswer { .. }, Event::TriageFailed { message, .. }) => {
            let mut next = state.clone();
            next.transcript.push(Turn::assistant(TRIAGE_FAILURE_NOTICE));
            next.phase = Phase::Idle;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::notify(Notice::error(format!(
                    "Failed to check symptoms: {message}"
                )))))
        }

        // ============================================================
        // Follow-up responses
        // ============================================================
        (
            Phase::AwaitingFollowUpAnswer { reply },
            Event::FollowUpAnswered {
                response,
                received_at,
                ..
            },
        ) => Ok(apply_follow_up_answer(state, context, reply, response, received_at)),

        // The reply stays in the transcript; no placeholder turn
        (Phase::AwaitingFollowUpAnswer { .. }, Event::FollowUpFailed { message, .. }) => {
            let mut next = state.clone();
            next.phase = Phase::InFollowUp;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::notify(Notice::error(format!(
                    "Follow-up failed: {message}"
                )))))
        }

        // ============================================================
        // Collaborator results: accepted in any phase
        // ============================================================
        (
            _,
            Event::DoctorsFound {
                specialization,
                doctors,
                ..
            },
        ) => {
            if state.pending.specialist.as_deref() != Some(specialization.as_str()) {
                // Superseded by a newer specialist recommendation
                return Ok(TransitionResult::new(state.clone()));
            }
            let mut next = state.clone();
            next.pending.doctors = doctors;
            Ok(TransitionResult::new(next).with_effect(Effect::PublishState))
        }

        (
            _,
            Event::DoctorLookupFailed {
                specialization,
                message,
                ..
            },
        ) => Ok(TransitionResult::new(state.clone()).with_effect(Effect::notify(
            Notice::warning(format!("Couldn't load {specialization} doctors: {message}")),
        ))),

        (_, Event::ReportSaved { .. }) => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::notify(Notice::info("Report saved to your history")))),

        // Finalized stays finalized
        (_, Event::ReportFailed { message, .. }) => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::notify(Notice::warning(format!(
                "Report could not be saved: {message}"
            ))))),

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "no transition from {} with event {}",
            phase.name(),
            event.name()
        ))),
    }
}

fn apply_triage_answer(
    state: &IntakeState,
    context: &IntakeContext,
    query: &str,
    response: &TriageResponse,
    received_at: DateTime<Utc>,
) -> TransitionResult {
    let answer = response.answer_or_fallback().to_string();
    let follow_up = response.follow_up().map(ToString::to_string);
    let specialist = response.specialist().map(ToString::to_string);

    let mut next = state.clone();
    next.transcript.push(Turn::assistant(&answer));
    if let Some(question) = &follow_up {
        next.transcript.push(Turn::assistant(question));
    }
    next.follow_up_count = 0;
    next.pending.answer = Some(answer.clone());
    next.pending.follow_up = follow_up;
    next.pending.specialist = specialist.clone();
    next.pending.doctors.clear();

    let mut effects = vec![Effect::PublishState];

    if response.is_final {
        next.phase = Phase::Finalized;
        next.pending.final_suggestion = Some(FinalSuggestion {
            answer: answer.clone(),
            tests: response.tests.clone(),
            specialist: specialist.clone(),
        });
        let report = build_report(
            &next,
            context,
            query,
            answer,
            response.tests.clone(),
            received_at,
        );
        effects.extend(submit_once(&mut next, report));
    } else {
        next.phase = Phase::InFollowUp;
    }

    if let Some(name) = specialist {
        effects.push(Effect::lookup_doctors(name));
    }
    effects.push(Effect::notify(Notice::success("Symptoms checked!")));

    TransitionResult::new(next).with_effects(effects)
}

fn apply_follow_up_answer(
    state: &IntakeState,
    context: &IntakeContext,
    reply: &str,
    response: FollowUpResponse,
    received_at: DateTime<Utc>,
) -> TransitionResult {
    let mut next = state.clone();
    let mut effects = vec![Effect::PublishState];

    if let Some(asked) = response.emergency_asked {
        next.emergency_asked = asked;
    }
    if let Some(doctors) = response.doctors.clone() {
        next.pending.doctors = doctors;
    }

    // The reply is the last turn; echo checks look at what preceded it
    let before_reply = &state.transcript[..state.transcript.len().saturating_sub(1)];

    let answer = response.answer().map(ToString::to_string);
    if let Some(text) = &answer {
        if !is_recent_echo(before_reply, text) {
            next.transcript.push(Turn::assistant(text));
        }
        next.pending.answer = Some(text.clone());
    }

    if let Some(name) = response.specialist() {
        next.pending.specialist = Some(name.to_string());
        effects.push(Effect::lookup_doctors(name));
    }

    let follow_up = response.follow_up().map(ToString::to_string);
    if let Some(question) = &follow_up {
        if !is_recent_echo(before_reply, question) {
            next.transcript.push(Turn::assistant(question));
        }
    }

    if response.is_final && is_affirmative(reply) {
        next.phase = Phase::Finalized;
        next.pending.follow_up = None;
        let suggestion = answer
            .or_else(|| state.pending.answer.clone())
            .unwrap_or_default();
        next.pending.final_suggestion = Some(FinalSuggestion {
            answer: suggestion.clone(),
            tests: response.tests.clone(),
            specialist: next.pending.specialist.clone(),
        });
        let symptoms = next.last_user_message().unwrap_or(reply).to_string();
        let report = build_report(
            &next,
            context,
            &symptoms,
            suggestion,
            response.tests,
            received_at,
        );
        effects.extend(submit_once(&mut next, report));
    } else {
        next.phase = Phase::InFollowUp;
        next.follow_up_count += 1;
        next.pending.follow_up = follow_up;
    }

    TransitionResult::new(next).with_effects(effects)
}

fn build_report(
    state: &IntakeState,
    context: &IntakeContext,
    symptoms: &str,
    ai_suggestion: String,
    suggested_tests: Vec<String>,
    date: DateTime<Utc>,
) -> SymptomReport {
    SymptomReport {
        user_id: context.user_id.clone(),
        date,
        symptoms: symptoms.to_string(),
        ai_suggestion,
        suggested_tests,
        urgency: DEFAULT_URGENCY.to_string(),
        full_conversation: state.transcript.clone(),
        phone: context.phone.clone().unwrap_or_default(),
    }
}

/// At most one save-report effect per conversation
fn submit_once(state: &mut IntakeState, report: SymptomReport) -> Option<Effect> {
    if state.report_submitted {
        return None;
    }
    state.report_submitted = true;
    Some(Effect::save_report(report))
}
