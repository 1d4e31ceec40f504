//! Symptom intake - terminal client for a remote triage service
//!
//! A conversation state machine that collects symptoms, relays follow-up
//! questions, and files a report once the triage service concludes.

mod backend;
mod booking;
mod config;
mod console;
mod history;
mod runtime;
mod state_machine;

use backend::{HttpBackend, LoggingBackend};
use config::ClientConfig;
use runtime::IntakeHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout belongs to the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "symptom_intake=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = ClientConfig::from_env()?;
    tracing::info!(
        api = %config.api_url,
        user_id = %config.user_id,
        has_phone = config.phone.is_some(),
        timeout_secs = config.timeout.as_secs(),
        "Configuration loaded"
    );

    let backend = LoggingBackend::new(HttpBackend::new(&config.api_url, config.timeout)?);
    let (handle, events) = IntakeHandle::spawn(backend, config.context());

    console::run(&handle, events).await?;

    Ok(())
}
