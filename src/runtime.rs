//! Runtime for executing intake conversations
//!
//! The runtime owns the current `IntakeState`, feeds events through the pure
//! `transition` function, and executes the resulting effects against a
//! `TriageBackend`. Observers subscribe to a broadcast channel of `UiEvent`s.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::IntakeRuntime;

use crate::backend::{
    AppointmentRequest, BackendError, RescheduleRequest, StoredAppointment, StoredReport,
    TriageBackend,
};
use crate::booking::parse_slot_date;
use crate::state_machine::{Event, IntakeContext, IntakeState, Notice};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Events sent to observers of a running conversation
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Full snapshot after a state change
    StateChanged { state: Box<IntakeState> },
    Notice(Notice),
    /// A submission was refused
    Error { message: String },
}

/// Handle to interact with a running conversation
///
/// History and appointment calls do not touch conversation state, so they go
/// straight to the backend instead of through the event loop.
pub struct IntakeHandle<B: TriageBackend> {
    event_tx: mpsc::Sender<Event>,
    backend: Arc<B>,
    context: IntakeContext,
}

impl<B: TriageBackend> Clone for IntakeHandle<B> {
    fn clone(&self) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            backend: self.backend.clone(),
            context: self.context.clone(),
        }
    }
}

impl<B: TriageBackend + 'static> IntakeHandle<B> {
    /// Start a runtime on the current tokio executor
    ///
    /// The returned receiver is subscribed before the runtime starts, so it
    /// sees the initial snapshot.
    pub fn spawn(backend: B, context: IntakeContext) -> (Self, broadcast::Receiver<UiEvent>) {
        let backend = Arc::new(backend);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);

        let runtime = IntakeRuntime::new(
            context.clone(),
            IntakeState::new(new_conversation_id()),
            backend.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx,
        );
        tokio::spawn(async move {
            runtime.run().await;
        });

        let handle = Self {
            event_tx,
            backend,
            context,
        };
        (handle, broadcast_rx)
    }

    pub fn context(&self) -> &IntakeContext {
        &self.context
    }

    /// Send an event to the conversation
    pub async fn send_event(&self, event: Event) -> Result<(), String> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    pub async fn submit_symptoms(&self, text: impl Into<String>) -> Result<(), String> {
        self.send_event(Event::SubmitSymptoms { text: text.into() })
            .await
    }

    pub async fn submit_reply(&self, text: impl Into<String>) -> Result<(), String> {
        self.send_event(Event::SubmitReply { text: text.into() })
            .await
    }

    /// Discard the current conversation and start over
    pub async fn new_conversation(&self) -> Result<(), String> {
        self.send_event(Event::NewConversation {
            conversation_id: new_conversation_id(),
        })
        .await
    }

    /// Stored reports for the session's phone number, newest first
    pub async fn fetch_history(&self) -> Result<Vec<StoredReport>, BackendError> {
        let phone = self.context.phone.as_deref().unwrap_or_default();
        let mut reports = self.backend.fetch_reports(phone).await?;
        reports.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(reports)
    }

    pub async fn delete_report(&self, id: &str) -> Result<(), BackendError> {
        let ack = self.backend.delete_report(id).await?;
        tracing::info!(report_id = %id, status = ?ack.status, "Report deleted");
        Ok(())
    }

    /// Book an appointment; returns the service's confirmation message
    pub async fn book(&self, request: &AppointmentRequest) -> Result<String, BackendError> {
        self.backend.book_appointment(request).await
    }

    /// Appointments for the session's phone number, soonest first
    pub async fn fetch_appointments(&self) -> Result<Vec<StoredAppointment>, BackendError> {
        let phone = self.context.phone.as_deref().unwrap_or_default();
        let mut appointments = self.backend.fetch_appointments(phone).await?;
        appointments.sort_by_cached_key(|a| {
            let day = parse_slot_date(&a.date);
            (day.is_none(), day, a.time.clone())
        });
        Ok(appointments)
    }

    pub async fn cancel_appointment(&self, id: &str) -> Result<String, BackendError> {
        let ack = self.backend.cancel_appointment(id).await?;
        tracing::info!(appointment_id = %id, "Appointment cancelled");
        Ok(ack
            .message
            .unwrap_or_else(|| "Appointment cancelled.".to_string()))
    }

    pub async fn reschedule_appointment(
        &self,
        id: &str,
        request: &RescheduleRequest,
    ) -> Result<String, BackendError> {
        let ack = self.backend.reschedule_appointment(id, request).await?;
        tracing::info!(
            appointment_id = %id,
            date = %request.date,
            time = %request.time,
            "Appointment rescheduled"
        );
        Ok(ack
            .message
            .unwrap_or_else(|| "Appointment rescheduled.".to_string()))
    }
}

fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
