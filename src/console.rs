//! Interactive terminal front-end
//!
//! Reads lines from stdin and renders runtime events to stdout. Logs go to
//! stderr so they never interleave with the transcript.

use crate::backend::{DoctorRecord, Role, StoredAppointment, TriageBackend};
use crate::booking::{
    appointment_timing, ensure_upcoming, open_slots, reschedule_request, resolve_slot, BookingForm,
};
use crate::history::HealthSummary;
use crate::runtime::{IntakeHandle, UiEvent};
use crate::state_machine::{IntakeState, NoticeLevel, Phase};
use chrono::{Local, NaiveDate, Utc};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast;

const HELP: &str = "\
Type your symptoms (or your answer to a follow-up question) and press enter.
Commands:
  /new                      start a new conversation
  /doctors                  list recommended doctors
  /slots <n>                open slots for doctor <n>
  /book <n> <date> <time>   book a slot with doctor <n>
  /appointments             your booked appointments
  /cancel <id>              cancel an upcoming appointment
  /reschedule <id> <date> <time>
                            move an upcoming appointment
  /history                  past reports
  /summary                  health summary from past reports
  /delete <id>              delete a past report
  /help                     show this help
  /quit                     exit";

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    New,
    Doctors,
    Slots(usize),
    Book {
        doctor: usize,
        date: String,
        time: String,
    },
    Appointments,
    Cancel(String),
    Reschedule {
        id: String,
        date: String,
        time: String,
    },
    History,
    Summary,
    Delete(String),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command {0}, try /help")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("new", []) => Ok(Command::New),
        ("doctors", []) => Ok(Command::Doctors),
        ("slots", [n]) => doctor_index(n)
            .map(Command::Slots)
            .ok_or(CommandError::Usage("/slots <n>")),
        ("book", [n, date, time]) => doctor_index(n)
            .map(|doctor| Command::Book {
                doctor,
                date: (*date).to_string(),
                time: (*time).to_string(),
            })
            .ok_or(CommandError::Usage("/book <n> <DD/MM/YYYY> <HH:MM>")),
        ("appointments", []) => Ok(Command::Appointments),
        ("cancel", [id]) => Ok(Command::Cancel((*id).to_string())),
        ("reschedule", [id, date, time]) => Ok(Command::Reschedule {
            id: (*id).to_string(),
            date: (*date).to_string(),
            time: (*time).to_string(),
        }),
        ("history", []) => Ok(Command::History),
        ("summary", []) => Ok(Command::Summary),
        ("delete", [id]) => Ok(Command::Delete((*id).to_string())),
        ("help", []) => Ok(Command::Help),
        ("quit" | "exit", []) => Ok(Command::Quit),
        ("slots", _) => Err(CommandError::Usage("/slots <n>")),
        ("book", _) => Err(CommandError::Usage("/book <n> <DD/MM/YYYY> <HH:MM>")),
        ("delete", _) => Err(CommandError::Usage("/delete <id>")),
        ("cancel", _) => Err(CommandError::Usage("/cancel <id>")),
        ("reschedule", _) => Err(CommandError::Usage("/reschedule <id> <DD/MM/YYYY> <HH:MM>")),
        _ => Err(CommandError::Unknown(format!("/{name}"))),
    }
}

/// 1-based index as typed by the user
fn doctor_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|n| *n > 0)
}

// ============================================================================
// Transcript view
// ============================================================================

/// Tracks what has already been printed so each snapshot renders as a diff
#[derive(Debug, Default)]
pub struct View {
    state: Option<IntakeState>,
    printed: usize,
    doctors_announced: usize,
}

impl View {
    /// Lines to print for a new snapshot
    pub fn render(&mut self, state: IntakeState) -> Vec<String> {
        let mut lines = Vec::new();
        let previous = self.state.take();

        let same_conversation = previous
            .as_ref()
            .is_some_and(|p| p.conversation_id == state.conversation_id);
        if !same_conversation {
            if previous.is_some() {
                lines.push("--- new conversation ---".to_string());
            }
            self.printed = 0;
            self.doctors_announced = 0;
        }

        for turn in state.transcript.iter().skip(self.printed) {
            let speaker = match turn.role {
                Role::User => "you",
                Role::Assistant => "assistant",
            };
            lines.push(format!("{speaker}: {}", turn.message));
        }
        self.printed = state.transcript.len();

        let was_final = same_conversation
            && previous
                .as_ref()
                .is_some_and(|p| p.phase == Phase::Finalized);
        if state.phase == Phase::Finalized && !was_final {
            if let Some(suggestion) = &state.pending.final_suggestion {
                lines.push(format!("Suggestion: {}", suggestion.answer));
                if !suggestion.tests.is_empty() {
                    lines.push(format!("Suggested tests: {}", suggestion.tests.join(", ")));
                }
                if let Some(specialist) = &suggestion.specialist {
                    lines.push(format!("Specialist: {specialist}"));
                }
            }
        }

        let doctors = state.pending.doctors.len();
        if state.doctors_visible() && doctors > 0 && doctors != self.doctors_announced {
            lines.push(format!("{doctors} doctor(s) available, type /doctors to see them"));
            self.doctors_announced = doctors;
        }

        self.state = Some(state);
        lines
    }

    pub fn state(&self) -> Option<&IntakeState> {
        self.state.as_ref()
    }

    /// Doctors the user may see right now
    pub fn visible_doctors(&self) -> &[DoctorRecord] {
        self.state
            .as_ref()
            .filter(|state| state.doctors_visible())
            .map_or(&[][..], |state| state.pending.doctors.as_slice())
    }
}

fn render_event(view: &mut View, event: UiEvent) -> Vec<String> {
    match event {
        UiEvent::StateChanged { state } => view.render(*state),
        UiEvent::Notice(notice) => {
            let tag = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Success => "ok",
                NoticeLevel::Warning => "warning",
                NoticeLevel::Error => "error",
            };
            vec![format!("[{tag}] {}", notice.message)]
        }
        UiEvent::Error { message } => vec![format!("[warning] {message}")],
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

// ============================================================================
// Main loop
// ============================================================================

pub async fn run<B: TriageBackend + 'static>(
    handle: &IntakeHandle<B>,
    mut events: broadcast::Receiver<UiEvent>,
) -> io::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut view = View::default();
    println!("{HELP}");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_lines(&render_event(&mut view, event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Console fell behind runtime events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = input.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => execute(handle, &view, &mut input, command).await?,
                    Err(e) => println!("[warning] {e}"),
                }
            }
        }
    }

    tracing::info!("Console closed");
    Ok(())
}

async fn execute<B, R>(
    handle: &IntakeHandle<B>,
    view: &View,
    input: &mut Lines<R>,
    command: Command,
) -> io::Result<()>
where
    B: TriageBackend + 'static,
    R: AsyncBufRead + Unpin,
{
    let sent = match command {
        Command::Say(text) => {
            let started = view.state().is_some_and(|s| s.phase != Phase::Idle);
            if !started {
                handle.submit_symptoms(text).await
            } else {
                handle.submit_reply(text).await
            }
        }
        Command::New => handle.new_conversation().await,
        Command::Doctors => {
            list_doctors(view.visible_doctors());
            Ok(())
        }
        Command::Slots(n) => {
            if let Some(doctor) = view.visible_doctors().get(n - 1) {
                list_slots(doctor);
            } else {
                println!("[warning] No doctor #{n}, type /doctors");
            }
            Ok(())
        }
        Command::Book { doctor, date, time } => {
            book(handle, view, input, doctor, &date, &time).await?;
            Ok(())
        }
        Command::Appointments => {
            show_appointments(handle).await;
            Ok(())
        }
        Command::Cancel(id) => {
            cancel(handle, &id).await;
            Ok(())
        }
        Command::Reschedule { id, date, time } => {
            reschedule(handle, &id, &date, &time).await;
            Ok(())
        }
        Command::History => {
            show_history(handle).await;
            Ok(())
        }
        Command::Summary => {
            show_summary(handle).await;
            Ok(())
        }
        Command::Delete(id) => {
            match handle.delete_report(&id).await {
                Ok(()) => println!("[ok] Report {id} deleted"),
                Err(e) => println!("[error] Could not delete report {id}: {e}"),
            }
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    if let Err(e) = sent {
        tracing::error!(error = %e, "Runtime unavailable");
        println!("[error] {e}");
    }
    Ok(())
}

fn list_doctors(doctors: &[DoctorRecord]) {
    if doctors.is_empty() {
        println!("No doctors to show yet. Ask the assistant to suggest a doctor first.");
        return;
    }
    for (i, doctor) in doctors.iter().enumerate() {
        let fee = if doctor.fee.is_empty() {
            String::new()
        } else {
            format!(", fee {}", doctor.fee)
        };
        println!(
            "{}. {} ({}) {}, contact {}{fee}",
            i + 1,
            doctor.name,
            doctor.specialization,
            doctor.location(),
            doctor.contact
        );
    }
}

fn list_slots(doctor: &DoctorRecord) {
    let slots = open_slots(doctor, Local::now().date_naive());
    if slots.is_empty() {
        println!("{} has no open slots", doctor.name);
        return;
    }
    println!("Open slots for {}:", doctor.name);
    for slot in slots {
        println!("  {} {}", slot.date, slot.time);
    }
}

async fn prompt<R: AsyncBufRead + Unpin>(input: &mut Lines<R>, label: &str) -> io::Result<String> {
    println!("{label}: ");
    Ok(input.next_line().await?.unwrap_or_default())
}

async fn book<B, R>(
    handle: &IntakeHandle<B>,
    view: &View,
    input: &mut Lines<R>,
    doctor: usize,
    date: &str,
    time: &str,
) -> io::Result<()>
where
    B: TriageBackend + 'static,
    R: AsyncBufRead + Unpin,
{
    let Some(doctor) = view.visible_doctors().get(doctor - 1) else {
        println!("[warning] No doctor #{doctor}, type /doctors");
        return Ok(());
    };
    let today = Local::now().date_naive();
    // Settle the slot before asking for any personal details
    let slot = match resolve_slot(doctor, date, time, today) {
        Ok(slot) => slot,
        Err(e) => {
            println!("[warning] {e}");
            return Ok(());
        }
    };

    let name = prompt(input, "Your name").await?;
    let phone = if let Some(phone) = &handle.context().phone {
        phone.clone()
    } else {
        prompt(input, "Phone").await?
    };
    let age = prompt(input, "Age").await?;
    let location = prompt(input, "Location").await?;
    let form = BookingForm {
        name,
        phone,
        age,
        location,
    };

    let request = match form.into_request(doctor, Some(&slot), today) {
        Ok(request) => request,
        Err(e) => {
            println!("[warning] {e}");
            return Ok(());
        }
    };

    match handle.book(&request).await {
        Ok(message) => println!("[ok] {message}"),
        Err(e) => println!("[error] {e}"),
    }
    Ok(())
}

async fn show_appointments<B: TriageBackend + 'static>(handle: &IntakeHandle<B>) {
    let appointments = match handle.fetch_appointments().await {
        Ok(appointments) => appointments,
        Err(e) => {
            println!("[error] Could not load appointments: {e}");
            return;
        }
    };
    if appointments.is_empty() {
        println!("No appointments.");
        return;
    }
    let today = Local::now().date_naive();
    for appointment in &appointments {
        println!(
            "{} {} ({}) {} at {} [{}] doctor status: {}",
            appointment.id,
            appointment.doctor_name,
            appointment.specialization,
            appointment.date,
            appointment.time,
            appointment_timing(appointment, today).label(),
            appointment.status
        );
    }
}

/// The user's appointment `id`, if it exists and has not taken place yet
async fn upcoming_appointment<B: TriageBackend + 'static>(
    handle: &IntakeHandle<B>,
    id: &str,
    today: NaiveDate,
) -> Option<StoredAppointment> {
    let appointments = match handle.fetch_appointments().await {
        Ok(appointments) => appointments,
        Err(e) => {
            println!("[error] Could not load appointments: {e}");
            return None;
        }
    };
    let Some(appointment) = appointments.into_iter().find(|a| a.id == id) else {
        println!("[warning] No appointment {id}, type /appointments");
        return None;
    };
    if let Err(e) = ensure_upcoming(&appointment, today) {
        println!("[warning] {e}");
        return None;
    }
    Some(appointment)
}

async fn cancel<B: TriageBackend + 'static>(handle: &IntakeHandle<B>, id: &str) {
    let today = Local::now().date_naive();
    if upcoming_appointment(handle, id, today).await.is_none() {
        return;
    }
    match handle.cancel_appointment(id).await {
        Ok(message) => println!("[ok] {message}"),
        Err(e) => println!("[error] Could not cancel appointment {id}: {e}"),
    }
}

async fn reschedule<B: TriageBackend + 'static>(
    handle: &IntakeHandle<B>,
    id: &str,
    date: &str,
    time: &str,
) {
    let today = Local::now().date_naive();
    let request = match reschedule_request(date, time, today) {
        Ok(request) => request,
        Err(e) => {
            println!("[warning] {e}");
            return;
        }
    };
    if upcoming_appointment(handle, id, today).await.is_none() {
        return;
    }
    match handle.reschedule_appointment(id, &request).await {
        Ok(message) => println!("[ok] {message}"),
        Err(e) => println!("[error] Could not reschedule appointment {id}: {e}"),
    }
}

async fn show_history<B: TriageBackend + 'static>(handle: &IntakeHandle<B>) {
    let reports = match handle.fetch_history().await {
        Ok(reports) => reports,
        Err(e) => {
            println!("[error] Could not load history: {e}");
            return;
        }
    };
    if reports.is_empty() {
        println!("No past reports.");
        return;
    }
    for report in reports {
        println!(
            "{} [{}] {}: {}",
            report.id,
            report.date.format("%d/%m/%Y"),
            report.symptoms,
            report.summary.as_deref().unwrap_or(&report.ai_suggestion)
        );
    }
}

async fn show_summary<B: TriageBackend + 'static>(handle: &IntakeHandle<B>) {
    let reports = match handle.fetch_history().await {
        Ok(reports) => reports,
        Err(e) => {
            println!("[error] Could not load history: {e}");
            return;
        }
    };
    let summary = HealthSummary::from_reports(&reports, Utc::now());
    println!("Reports: {}", summary.report_count);
    println!("Days since last report: {}", summary.days_since_last_report);
    if summary.frequent_symptoms.is_empty() {
        println!("No recurring symptoms.");
    } else {
        println!("Recurring symptoms: {}", summary.frequent_symptoms.join(", "));
    }
}
