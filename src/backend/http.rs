//! HTTP implementation of the triage backend

use super::types::*;
use super::{BackendError, TriageBackend};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Talks JSON (and one form post) to the triage API
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::network(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::network(format!("Invalid API URL {base_url}: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.send().await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| BackendError::decode(format!("Failed to parse response: {e} - body: {body}")))
    }
}

/// Map a non-2xx status to an error, preferring the service's own message
fn classify_error(status: StatusCode, body: &str) -> BackendError {
    let message = service_message(body).unwrap_or_else(|| body.to_string());
    match status.as_u16() {
        404 => BackendError::not_found(format!("Not found: {message}")),
        400..=499 => BackendError::rejected(message),
        500..=599 => BackendError::server_error(format!("Server error: {message}")),
        _ => BackendError::network(format!("HTTP {status}: {message}")),
    }
}

/// The service answers errors as `{"message": ..}` or FastAPI's `{"detail": ..}`
fn service_message(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "detail"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(|v| v.as_str()))
        .map(ToString::to_string)
}

#[async_trait]
impl TriageBackend for HttpBackend {
    async fn check_symptoms(&self, query: &str) -> Result<TriageResponse, BackendError> {
        // The service reads this one as a form field
        let request = self
            .client
            .post(self.url(&["symptom-check"]))
            .form(&[("query", query)]);
        self.send(request).await
    }

    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResponse, BackendError> {
        let request = self.client.post(self.url(&["follow-up"])).json(request);
        self.send(request).await
    }

    async fn find_doctors(&self, specialization: &str) -> Result<Vec<DoctorRecord>, BackendError> {
        let body = DoctorLookupRequest {
            specialization: specialization.to_string(),
        };
        let request = self.client.post(self.url(&["find-doctors"])).json(&body);
        let response: DoctorLookupResponse = self.send(request).await?;
        Ok(response.doctors)
    }

    async fn save_report(&self, report: &SymptomReport) -> Result<Ack, BackendError> {
        let request = self.client.post(self.url(&["save-report"])).json(report);
        self.send(request).await
    }

    async fn fetch_reports(&self, phone: &str) -> Result<Vec<StoredReport>, BackendError> {
        let body = ReportHistoryRequest {
            phone: phone.to_string(),
        };
        let request = self.client.post(self.url(&["get-reports"])).json(&body);
        let response: ReportHistoryResponse = self.send(request).await?;
        Ok(response.reports)
    }

    async fn delete_report(&self, report_id: &str) -> Result<Ack, BackendError> {
        let request = self
            .client
            .delete(self.url(&["delete-report", report_id]));
        self.send(request).await
    }

    async fn book_appointment(&self, request: &AppointmentRequest) -> Result<String, BackendError> {
        let request = self.client.post(self.url(&["book-appointment"])).json(request);
        let ack: Ack = self.send(request).await?;
        Ok(ack
            .message
            .unwrap_or_else(|| "Appointment requested.".to_string()))
    }

    async fn fetch_appointments(&self, phone: &str) -> Result<Vec<StoredAppointment>, BackendError> {
        let request = self
            .client
            .get(self.url(&["get-user-appointments"]))
            .query(&[("phone", phone)]);
        let response: AppointmentListResponse = self.send(request).await?;
        Ok(response.appointments)
    }

    async fn cancel_appointment(&self, appointment_id: &str) -> Result<Ack, BackendError> {
        let request = self
            .client
            .delete(self.url(&["cancel-appointment", appointment_id]));
        self.send(request).await
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: &RescheduleRequest,
    ) -> Result<Ack, BackendError> {
        let request = self
            .client
            .put(self.url(&["reschedule-appointment", appointment_id]))
            .json(request);
        self.send(request).await
    }
}
