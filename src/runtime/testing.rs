//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::backend::{
    Ack, AppointmentRequest, BackendError, DoctorRecord, FollowUpRequest, FollowUpResponse,
    RescheduleRequest, StoredAppointment, StoredReport, SymptomReport, TriageBackend,
    TriageResponse,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock Backend
// ============================================================================

/// Mock backend that returns queued responses and records every request
#[derive(Default)]
pub struct MockBackend {
    triage: Mutex<VecDeque<Result<TriageResponse, BackendError>>>,
    follow_ups: Mutex<VecDeque<Result<FollowUpResponse, BackendError>>>,
    doctors: Mutex<VecDeque<Result<Vec<DoctorRecord>, BackendError>>>,
    reports: Mutex<Vec<StoredReport>>,
    save_error: Mutex<Option<BackendError>>,
    /// Delay applied to triage and follow-up calls
    delay: Option<Duration>,
    /// Notified when a triage or follow-up request starts
    pub request_started: Arc<Notify>,

    pub triage_requests: Mutex<Vec<String>>,
    pub follow_up_requests: Mutex<Vec<FollowUpRequest>>,
    pub doctor_requests: Mutex<Vec<String>>,
    pub saved_reports: Mutex<Vec<SymptomReport>>,
    pub bookings: Mutex<Vec<AppointmentRequest>>,
    /// Appointments as the service stores them; booking appends here
    pub appointments: Mutex<Vec<StoredAppointment>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold triage and follow-up calls for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_triage(&self, response: TriageResponse) {
        self.triage.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_triage_error(&self, error: BackendError) {
        self.triage.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_follow_up(&self, response: FollowUpResponse) {
        self.follow_ups.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_follow_up_error(&self, error: BackendError) {
        self.follow_ups.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_doctors(&self, doctors: Vec<DoctorRecord>) {
        self.doctors.lock().unwrap().push_back(Ok(doctors));
    }

    pub fn with_reports(self, reports: Vec<StoredReport>) -> Self {
        *self.reports.lock().unwrap() = reports;
        self
    }

    pub fn with_appointments(self, appointments: Vec<StoredAppointment>) -> Self {
        *self.appointments.lock().unwrap() = appointments;
        self
    }

    pub fn fail_saves(&self, error: BackendError) {
        *self.save_error.lock().unwrap() = Some(error);
    }

    pub fn recorded_follow_ups(&self) -> Vec<FollowUpRequest> {
        self.follow_up_requests.lock().unwrap().clone()
    }

    pub fn recorded_reports(&self) -> Vec<SymptomReport> {
        self.saved_reports.lock().unwrap().clone()
    }

    async fn pause(&self) {
        self.request_started.notify_waiters();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TriageBackend for MockBackend {
    async fn check_symptoms(&self, query: &str) -> Result<TriageResponse, BackendError> {
        self.triage_requests.lock().unwrap().push(query.to_string());
        self.pause().await;
        self.triage
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::network("No mock response queued")))
    }

    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResponse, BackendError> {
        self.follow_up_requests.lock().unwrap().push(request.clone());
        self.pause().await;
        self.follow_ups
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::network("No mock response queued")))
    }

    async fn find_doctors(&self, specialization: &str) -> Result<Vec<DoctorRecord>, BackendError> {
        self.doctor_requests
            .lock()
            .unwrap()
            .push(specialization.to_string());
        self.doctors
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn save_report(&self, report: &SymptomReport) -> Result<Ack, BackendError> {
        if let Some(error) = self.save_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.saved_reports.lock().unwrap().push(report.clone());
        Ok(Ack::default())
    }

    async fn fetch_reports(&self, _phone: &str) -> Result<Vec<StoredReport>, BackendError> {
        Ok(self.reports.lock().unwrap().clone())
    }

    async fn delete_report(&self, report_id: &str) -> Result<Ack, BackendError> {
        let mut reports = self.reports.lock().unwrap();
        let before = reports.len();
        reports.retain(|r| r.id != report_id);
        if reports.len() == before {
            return Err(BackendError::not_found("Report not found"));
        }
        Ok(Ack::default())
    }

    async fn book_appointment(&self, request: &AppointmentRequest) -> Result<String, BackendError> {
        let mut bookings = self.bookings.lock().unwrap();
        let taken = bookings.iter().any(|b| {
            b.doctor_name == request.doctor_name && b.date == request.date && b.time == request.time
        });
        if taken {
            return Err(BackendError::rejected("Slot already booked"));
        }
        bookings.push(request.clone());

        let mut appointments = self.appointments.lock().unwrap();
        let id = format!("ap{}", appointments.len() + 1);
        appointments.push(StoredAppointment {
            id,
            user_name: request.user_name.clone(),
            phone: request.phone.clone(),
            doctor_name: request.doctor_name.clone(),
            specialization: request.specialization.clone(),
            location: request.location.clone(),
            date: request.date.clone(),
            time: request.time.clone(),
            status: "Pending".to_string(),
        });
        Ok("Appointment booked".to_string())
    }

    async fn fetch_appointments(&self, phone: &str) -> Result<Vec<StoredAppointment>, BackendError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.phone == phone)
            .cloned()
            .collect())
    }

    async fn cancel_appointment(&self, appointment_id: &str) -> Result<Ack, BackendError> {
        let mut appointments = self.appointments.lock().unwrap();
        let before = appointments.len();
        appointments.retain(|a| a.id != appointment_id);
        if appointments.len() == before {
            return Err(BackendError::not_found("Appointment not found"));
        }
        Ok(Ack {
            status: None,
            message: Some("Appointment cancelled successfully".to_string()),
        })
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: &RescheduleRequest,
    ) -> Result<Ack, BackendError> {
        let mut appointments = self.appointments.lock().unwrap();
        let Some(appointment) = appointments.iter_mut().find(|a| a.id == appointment_id) else {
            return Err(BackendError::not_found("Appointment not found"));
        };
        appointment.date = request.date.clone();
        appointment.time = request.time.clone();
        Ok(Ack {
            status: None,
            message: Some("Meeting Rescheduled".to_string()),
        })
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

use crate::runtime::{IntakeHandle, UiEvent};
use crate::state_machine::{IntakeContext, IntakeState, NoticeLevel};
use tokio::sync::broadcast;

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub handle: IntakeHandle<Arc<MockBackend>>,
    pub backend: Arc<MockBackend>,
    pub broadcast_rx: broadcast::Receiver<UiEvent>,
    /// Latest snapshot seen on the broadcast channel
    pub last_state: Option<IntakeState>,
}

pub struct TestRuntimeBuilder {
    backend: Option<MockBackend>,
    context: IntakeContext,
}

impl TestRuntime {
    /// Create a simple test runtime with instant mocks
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder {
            backend: None,
            context: IntakeContext::new("test-user", Some("5550100".to_string())),
        }
    }
}

impl TestRuntimeBuilder {
    pub fn backend(mut self, backend: MockBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn context(mut self, context: IntakeContext) -> Self {
        self.context = context;
        self
    }

    pub fn build(self) -> TestRuntime {
        let backend = Arc::new(self.backend.unwrap_or_default());
        let (handle, broadcast_rx) = IntakeHandle::spawn(backend.clone(), self.context);
        TestRuntime {
            handle,
            backend,
            broadcast_rx,
            last_state: None,
        }
    }
}

impl TestRuntime {
    pub async fn send_symptoms(&self, text: &str) {
        self.handle
            .submit_symptoms(text)
            .await
            .expect("Failed to send symptoms");
    }

    pub async fn send_reply(&self, text: &str) {
        self.handle
            .submit_reply(text)
            .await
            .expect("Failed to send reply");
    }

    /// Wait until a published state satisfies `predicate`
    pub async fn wait_for_state(
        &mut self,
        predicate: impl Fn(&IntakeState) -> bool,
        timeout: Duration,
    ) -> Option<IntakeState> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::StateChanged { state })) => {
                    let state = *state;
                    self.last_state = Some(state.clone());
                    if predicate(&state) {
                        return Some(state);
                    }
                }
                _ => continue,
            }
        }
        None
    }

    /// Wait for a phase by its serialized name
    pub async fn wait_for_phase(&mut self, phase: &str, timeout: Duration) -> Option<IntakeState> {
        self.wait_for_state(|s| s.phase.name() == phase, timeout)
            .await
    }

    /// Wait for a notice of the given level, returning its message
    pub async fn wait_for_notice(&mut self, level: NoticeLevel, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::Notice(notice))) if notice.level == level => {
                    return Some(notice.message)
                }
                _ => continue,
            }
        }
        None
    }

    /// Wait for a refused submission
    pub async fn wait_for_error(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::Error { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendErrorKind, Turn};
    use crate::state_machine::transition::TRIAGE_FAILURE_NOTICE;
    use crate::state_machine::Phase;

    const WAIT: Duration = Duration::from_secs(2);

    fn first_answer() -> TriageResponse {
        TriageResponse {
            answer: Some("Probably a viral infection".into()),
            specialist: Some("General Physician".into()),
            follow_up_question: Some("Do you have a sore throat?".into()),
            is_final: false,
            tests: vec![],
        }
    }

    #[tokio::test]
    async fn test_mock_backend_queue() {
        let mock = MockBackend::new();
        mock.queue_triage(first_answer());

        let response = mock.check_symptoms("fever").await.unwrap();
        assert!(!response.is_final);

        // Second call should fail (no more responses)
        let result = mock.check_symptoms("fever").await;
        assert!(result.is_err());
        assert_eq!(mock.triage_requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_initial_submit_enters_follow_up() {
        let backend = MockBackend::new();
        backend.queue_triage(first_answer());
        backend.queue_doctors(vec![DoctorRecord {
            name: "Dr. Rao".into(),
            ..Default::default()
        }]);

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_symptoms("fever and cough").await;

        let state = rt.wait_for_phase("in_follow_up", WAIT).await.unwrap();
        assert_eq!(state.transcript[1], Turn::user("fever and cough"));
        assert_eq!(
            state.transcript.last(),
            Some(&Turn::assistant("Do you have a sore throat?"))
        );

        // Doctor lookup completes separately
        let state = rt
            .wait_for_state(|s| !s.pending.doctors.is_empty(), WAIT)
            .await
            .unwrap();
        assert_eq!(state.pending.doctors[0].name, "Dr. Rao");
        assert!(!state.doctors_visible());
        assert_eq!(
            rt.backend.doctor_requests.lock().unwrap().clone(),
            vec!["General Physician".to_string()]
        );
    }

    #[tokio::test]
    async fn test_whitespace_submit_is_refused_without_request() {
        let mut rt = TestRuntime::builder().build();
        rt.send_symptoms("   ").await;

        let message = rt.wait_for_error(WAIT).await.unwrap();
        assert_eq!(message, "Please describe your symptoms.");
        assert!(rt.backend.triage_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_in_flight_is_refused() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(300));
        backend.queue_triage(first_answer());
        let started = backend.request_started.clone();

        let mut rt = TestRuntime::builder().backend(backend).build();
        let wait_started = started.notified();
        rt.send_symptoms("headache").await;
        wait_started.await;

        rt.send_symptoms("headache again").await;
        let message = rt.wait_for_error(WAIT).await.unwrap();
        assert!(message.contains("waiting"));
        assert_eq!(rt.backend.triage_requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_round_trip_and_finalize() {
        let backend = MockBackend::new();
        backend.queue_triage(first_answer());
        backend.queue_follow_up(FollowUpResponse {
            answer: Some("Noted".into()),
            follow_up_question: Some("Would you like me to suggest a doctor?".into()),
            emergency_asked: Some(true),
            ..Default::default()
        });
        backend.queue_follow_up(FollowUpResponse {
            answer: Some("See a General Physician".into()),
            is_final: true,
            tests: vec!["CBC".into()],
            ..Default::default()
        });

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_symptoms("fever and cough").await;
        rt.wait_for_phase("in_follow_up", WAIT).await.unwrap();

        rt.send_reply("no sore throat").await;
        let state = rt
            .wait_for_state(
                |s| s.phase == Phase::InFollowUp && s.follow_up_count == 1,
                WAIT,
            )
            .await
            .unwrap();
        assert!(state.emergency_asked);

        rt.send_reply("yes please").await;
        let state = rt.wait_for_phase("finalized", WAIT).await.unwrap();
        assert!(state.doctors_visible());

        let requests = rt.backend.recorded_follow_ups();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].conversation.last(), Some(&Turn::user("no sore throat")));
        assert_eq!(requests[0].count, 0);
        assert!(!requests[0].emergency_asked);
        assert_eq!(requests[1].count, 1);
        assert!(requests[1].emergency_asked);
        assert_eq!(requests[1].user_id, "test-user");

        let message = rt.wait_for_notice(NoticeLevel::Info, WAIT).await.unwrap();
        assert!(message.contains("saved"));
        let reports = rt.backend.recorded_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].symptoms, "yes please");
        assert_eq!(reports[0].ai_suggestion, "See a General Physician");
        assert_eq!(reports[0].phone, "5550100");
    }

    #[tokio::test]
    async fn test_triage_failure_returns_to_idle() {
        let backend = MockBackend::new();
        backend.queue_triage_error(BackendError::server_error("boom"));

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_symptoms("rash").await;

        let state = rt
            .wait_for_state(|s| s.phase == Phase::Idle && s.transcript.len() > 2, WAIT)
            .await
            .unwrap();
        assert_eq!(state.transcript[1], Turn::user("rash"));
        assert_eq!(
            state.transcript.last(),
            Some(&Turn::assistant(TRIAGE_FAILURE_NOTICE))
        );

        let message = rt.wait_for_notice(NoticeLevel::Error, WAIT).await.unwrap();
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn test_report_failure_stays_finalized() {
        let backend = MockBackend::new();
        backend.queue_triage(TriageResponse {
            answer: Some("Rest".into()),
            is_final: true,
            ..Default::default()
        });
        backend.fail_saves(BackendError::server_error("db down"));

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_symptoms("tired").await;
        rt.wait_for_phase("finalized", WAIT).await.unwrap();

        let message = rt.wait_for_notice(NoticeLevel::Warning, WAIT).await.unwrap();
        assert!(message.contains("db down"));

        rt.send_reply("more").await;
        let message = rt.wait_for_error(WAIT).await.unwrap();
        assert!(message.contains("finished"));
    }

    #[tokio::test]
    async fn test_stale_response_dropped_after_new_conversation() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(200));
        backend.queue_triage(first_answer());
        let started = backend.request_started.clone();

        let mut rt = TestRuntime::builder().backend(backend).build();
        let wait_started = started.notified();
        rt.send_symptoms("fever").await;
        wait_started.await;
        rt.handle.new_conversation().await.unwrap();

        // Let the delayed triage answer arrive
        tokio::time::sleep(Duration::from_millis(400)).await;
        let mut latest = None;
        while let Ok(event) = rt.broadcast_rx.try_recv() {
            if let UiEvent::StateChanged { state } = event {
                latest = Some(*state);
            }
        }
        let state = latest.unwrap();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_history_sorted_and_delete() {
        let older: StoredReport =
            serde_json::from_value(serde_json::json!({"_id": "a", "date": "2025-01-01T00:00:00Z"}))
                .unwrap();
        let newer: StoredReport =
            serde_json::from_value(serde_json::json!({"_id": "b", "date": "2025-03-01T00:00:00Z"}))
                .unwrap();
        let backend = MockBackend::new().with_reports(vec![older, newer]);

        let rt = TestRuntime::builder().backend(backend).build();
        let reports = rt.handle.fetch_history().await.unwrap();
        assert_eq!(reports[0].id, "b");
        assert_eq!(reports[1].id, "a");

        rt.handle.delete_report("a").await.unwrap();
        let err = rt.handle.delete_report("a").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_double_booking_rejected() {
        let rt = TestRuntime::builder().build();
        let request = AppointmentRequest {
            user_name: "Asha".into(),
            phone: "5550100".into(),
            age: 30,
            location: "Pune".into(),
            doctor_name: "Dr. Rao".into(),
            specialization: "General Physician".into(),
            date: "12/05/2025".into(),
            time: "10:00".into(),
            amount: 500,
            contact: "5550199".into(),
        };

        assert_eq!(rt.handle.book(&request).await.unwrap(), "Appointment booked");
        let err = rt.handle.book(&request).await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Rejected);
        assert_eq!(err.message, "Slot already booked");
    }

    #[tokio::test]
    async fn test_appointments_listed_rescheduled_and_cancelled() {
        let someone_else = StoredAppointment {
            id: "other".into(),
            phone: "5550999".into(),
            date: "01/05/2025".into(),
            ..Default::default()
        };
        let backend = MockBackend::new().with_appointments(vec![someone_else]);
        let rt = TestRuntime::builder().backend(backend).build();

        for (date, time) in [("20/06/2025", "10:00"), ("14/05/2025", "16:00")] {
            let request = AppointmentRequest {
                user_name: "Asha".into(),
                phone: "5550100".into(),
                age: 30,
                location: "Pune".into(),
                doctor_name: "Dr. Rao".into(),
                specialization: "General Physician".into(),
                date: date.into(),
                time: time.into(),
                amount: 500,
                contact: "5550199".into(),
            };
            rt.handle.book(&request).await.unwrap();
        }

        let appointments = rt.handle.fetch_appointments().await.unwrap();
        let dates: Vec<_> = appointments.iter().map(|a| a.date.as_str()).collect();
        assert_eq!(dates, vec!["14/05/2025", "20/06/2025"]);
        assert!(appointments.iter().all(|a| a.status == "Pending"));

        let moved = RescheduleRequest {
            date: "21/06/2025".into(),
            time: "11:30".into(),
        };
        let message = rt
            .handle
            .reschedule_appointment(&appointments[1].id, &moved)
            .await
            .unwrap();
        assert_eq!(message, "Meeting Rescheduled");

        let message = rt
            .handle
            .cancel_appointment(&appointments[0].id)
            .await
            .unwrap();
        assert!(message.contains("cancelled"));

        let remaining = rt.handle.fetch_appointments().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].date, "21/06/2025");
        assert_eq!(remaining[0].time, "11:30");

        let err = rt
            .handle
            .cancel_appointment(&appointments[0].id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::NotFound);
    }
}
