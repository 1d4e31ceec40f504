//! Intake runtime executor

use super::UiEvent;

use crate::backend::TriageBackend;
use crate::state_machine::{
    transition, Effect, Event, IntakeContext, IntakeState, Notice,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Generic intake runtime that can work with any backend implementation
pub struct IntakeRuntime<B>
where
    B: TriageBackend + 'static,
{
    context: IntakeContext,
    state: IntakeState,
    backend: Arc<B>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<UiEvent>,
}

impl<B> IntakeRuntime<B>
where
    B: TriageBackend + 'static,
{
    pub fn new(
        context: IntakeContext,
        state: IntakeState,
        backend: Arc<B>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            context,
            state,
            backend,
            event_rx,
            event_tx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            conv_id = %self.state.conversation_id,
            user_id = %self.context.user_id,
            "Starting intake runtime"
        );
        self.publish_state();

        // Process events in a loop - no recursion
        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        tracing::info!(conv_id = %self.state.conversation_id, "Intake runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let event_name = event.name();
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) if !e.is_user_facing() => {
                tracing::debug!(event = event_name, error = %e, "Dropping event");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    event = event_name,
                    phase = self.state.phase.name(),
                    error = %e,
                    "Transition rejected"
                );
                // Transition errors are user-facing (e.g., "request in flight")
                let _ = self.broadcast_tx.send(UiEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        let old_phase = self.state.phase.name();
        self.state = result.new_state;
        if old_phase != self.state.phase.name() {
            tracing::info!(
                conv_id = %self.state.conversation_id,
                from = old_phase,
                to = self.state.phase.name(),
                count = self.state.follow_up_count,
                "Phase changed"
            );
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    /// Execute an effect; remote calls run in background tasks and report
    /// back through the event channel
    fn execute_effect(&self, effect: Effect) {
        let conversation_id = self.state.conversation_id.clone();
        let backend = self.backend.clone();
        let event_tx = self.event_tx.clone();

        match effect {
            Effect::PublishState => self.publish_state(),

            Effect::Notify(notice) => self.notify(notice),

            Effect::RequestTriage { query } => {
                tokio::spawn(async move {
                    tracing::info!(conv_id = %conversation_id, "Requesting triage (background)");
                    let event = match backend.check_symptoms(&query).await {
                        Ok(response) => Event::TriageAnswered {
                            conversation_id,
                            response,
                            received_at: Utc::now(),
                        },
                        Err(e) => Event::TriageFailed {
                            conversation_id,
                            message: e.message,
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            Effect::RequestFollowUp { request } => {
                tokio::spawn(async move {
                    tracing::info!(
                        conv_id = %conversation_id,
                        count = request.count,
                        "Requesting follow-up (background)"
                    );
                    let event = match backend.follow_up(&request).await {
                        Ok(response) => Event::FollowUpAnswered {
                            conversation_id,
                            response,
                            received_at: Utc::now(),
                        },
                        Err(e) => Event::FollowUpFailed {
                            conversation_id,
                            message: e.message,
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            Effect::LookupDoctors { specialization } => {
                tokio::spawn(async move {
                    tracing::info!(specialist = %specialization, "Looking up doctors");
                    let event = match backend.find_doctors(&specialization).await {
                        Ok(doctors) => Event::DoctorsFound {
                            conversation_id,
                            specialization,
                            doctors,
                        },
                        Err(e) => Event::DoctorLookupFailed {
                            conversation_id,
                            specialization,
                            message: e.message,
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            Effect::SaveReport { report } => {
                tokio::spawn(async move {
                    tracing::info!(conv_id = %conversation_id, "Saving report");
                    let event = match backend.save_report(&report).await {
                        Ok(_) => Event::ReportSaved { conversation_id },
                        Err(e) => Event::ReportFailed {
                            conversation_id,
                            message: e.message,
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }
        }
    }

    fn publish_state(&self) {
        let _ = self.broadcast_tx.send(UiEvent::StateChanged {
            state: Box::new(self.state.clone()),
        });
    }

    fn notify(&self, notice: Notice) {
        let _ = self.broadcast_tx.send(UiEvent::Notice(notice));
    }
}
