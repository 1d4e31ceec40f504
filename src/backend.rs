//! Triage API abstraction
//!
//! The remote service does all of the medical reasoning; this module only
//! knows the request/response contracts of its endpoints.

mod error;
mod http;
mod types;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Endpoints the intake client depends on
#[async_trait]
pub trait TriageBackend: Send + Sync {
    /// `POST /symptom-check`
    async fn check_symptoms(&self, query: &str) -> Result<TriageResponse, BackendError>;

    /// `POST /follow-up`
    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResponse, BackendError>;

    /// `POST /find-doctors`
    async fn find_doctors(&self, specialization: &str) -> Result<Vec<DoctorRecord>, BackendError>;

    /// `POST /save-report`
    async fn save_report(&self, report: &SymptomReport) -> Result<Ack, BackendError>;

    /// `POST /get-reports`
    async fn fetch_reports(&self, phone: &str) -> Result<Vec<StoredReport>, BackendError>;

    /// `DELETE /delete-report/{id}`
    async fn delete_report(&self, report_id: &str) -> Result<Ack, BackendError>;

    /// `POST /book-appointment`, returns the confirmation message
    async fn book_appointment(&self, request: &AppointmentRequest) -> Result<String, BackendError>;

    /// `GET /get-user-appointments?phone=`
    async fn fetch_appointments(&self, phone: &str) -> Result<Vec<StoredAppointment>, BackendError>;

    /// `DELETE /cancel-appointment/{id}`
    async fn cancel_appointment(&self, appointment_id: &str) -> Result<Ack, BackendError>;

    /// `PUT /reschedule-appointment/{id}`
    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: &RescheduleRequest,
    ) -> Result<Ack, BackendError>;
}

#[async_trait]
impl<T: TriageBackend + ?Sized> TriageBackend for Arc<T> {
    async fn check_symptoms(&self, query: &str) -> Result<TriageResponse, BackendError> {
        (**self).check_symptoms(query).await
    }

    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResponse, BackendError> {
        (**self).follow_up(request).await
    }

    async fn find_doctors(&self, specialization: &str) -> Result<Vec<DoctorRecord>, BackendError> {
        (**self).find_doctors(specialization).await
    }

    async fn save_report(&self, report: &SymptomReport) -> Result<Ack, BackendError> {
        (**self).save_report(report).await
    }

    async fn fetch_reports(&self, phone: &str) -> Result<Vec<StoredReport>, BackendError> {
        (**self).fetch_reports(phone).await
    }

    async fn delete_report(&self, report_id: &str) -> Result<Ack, BackendError> {
        (**self).delete_report(report_id).await
    }

    async fn book_appointment(&self, request: &AppointmentRequest) -> Result<String, BackendError> {
        (**self).book_appointment(request).await
    }

    async fn fetch_appointments(&self, phone: &str) -> Result<Vec<StoredAppointment>, BackendError> {
        (**self).fetch_appointments(phone).await
    }

    async fn cancel_appointment(&self, appointment_id: &str) -> Result<Ack, BackendError> {
        (**self).cancel_appointment(appointment_id).await
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: &RescheduleRequest,
    ) -> Result<Ack, BackendError> {
        (**self).reschedule_appointment(appointment_id, request).await
    }
}

/// Logging wrapper for a backend
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B: TriageBackend> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    fn log<T>(endpoint: &'static str, start: Instant, result: &Result<T, BackendError>) {
        let duration_ms = start.elapsed().as_millis();
        match result {
            Ok(_) => tracing::info!(endpoint, duration_ms = %duration_ms, "Backend call completed"),
            Err(e) => tracing::warn!(
                endpoint,
                duration_ms = %duration_ms,
                error = %e.message,
                kind = ?e.kind,
                transient = e.kind.is_transient(),
                "Backend call failed"
            ),
        }
    }
}

#[async_trait]
impl<B: TriageBackend> TriageBackend for LoggingBackend<B> {
    async fn check_symptoms(&self, query: &str) -> Result<TriageResponse, BackendError> {
        let start = Instant::now();
        let result = self.inner.check_symptoms(query).await;
        Self::log("symptom-check", start, &result);
        if let Ok(resp) = &result {
            tracing::debug!(
                specialist = ?resp.specialist,
                is_final = resp.is_final,
                has_follow_up = resp.follow_up().is_some(),
                "Triage answered"
            );
        }
        result
    }

    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResponse, BackendError> {
        let start = Instant::now();
        let result = self.inner.follow_up(request).await;
        Self::log("follow-up", start, &result);
        if let Ok(resp) = &result {
            tracing::debug!(
                count = request.count,
                turns = request.conversation.len(),
                is_final = resp.is_final,
                emergency_asked = ?resp.emergency_asked,
                "Follow-up answered"
            );
        }
        result
    }

    async fn find_doctors(&self, specialization: &str) -> Result<Vec<DoctorRecord>, BackendError> {
        let start = Instant::now();
        let result = self.inner.find_doctors(specialization).await;
        Self::log("find-doctors", start, &result);
        result
    }

    async fn save_report(&self, report: &SymptomReport) -> Result<Ack, BackendError> {
        let start = Instant::now();
        let result = self.inner.save_report(report).await;
        Self::log("save-report", start, &result);
        result
    }

    async fn fetch_reports(&self, phone: &str) -> Result<Vec<StoredReport>, BackendError> {
        let start = Instant::now();
        let result = self.inner.fetch_reports(phone).await;
        Self::log("get-reports", start, &result);
        result
    }

    async fn delete_report(&self, report_id: &str) -> Result<Ack, BackendError> {
        let start = Instant::now();
        let result = self.inner.delete_report(report_id).await;
        Self::log("delete-report", start, &result);
        result
    }

    async fn book_appointment(&self, request: &AppointmentRequest) -> Result<String, BackendError> {
        let start = Instant::now();
        let result = self.inner.book_appointment(request).await;
        Self::log("book-appointment", start, &result);
        result
    }

    async fn fetch_appointments(&self, phone: &str) -> Result<Vec<StoredAppointment>, BackendError> {
        let start = Instant::now();
        let result = self.inner.fetch_appointments(phone).await;
        Self::log("get-user-appointments", start, &result);
        result
    }

    async fn cancel_appointment(&self, appointment_id: &str) -> Result<Ack, BackendError> {
        let start = Instant::now();
        let result = self.inner.cancel_appointment(appointment_id).await;
        Self::log("cancel-appointment", start, &result);
        result
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: &RescheduleRequest,
    ) -> Result<Ack, BackendError> {
        let start = Instant::now();
        let result = self
            .inner
            .reschedule_appointment(appointment_id, request)
            .await;
        Self::log("reschedule-appointment", start, &result);
        if result.is_ok() {
            tracing::debug!(date = %request.date, time = %request.time, "Appointment moved");
        }
        result
    }
}
