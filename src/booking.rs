//! Doctor slot availability and appointment requests

use crate::backend::{AppointmentRequest, DoctorRecord, RescheduleRequest, StoredAppointment};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Date format used by the slot maps
pub const SLOT_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Open,
    Booked,
    Past,
}

/// One bookable time on one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub date: String,
    pub time: String,
    pub status: SlotStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("Please enter your name")]
    MissingName,
    #[error("Please enter your phone number")]
    MissingPhone,
    #[error("Age must be a number, got {0:?}")]
    InvalidAge(String),
    #[error("Please pick a time slot")]
    MissingSlot,
    #[error("The {date} {time} slot is no longer available")]
    SlotUnavailable { date: String, time: String },
    #[error("{doctor} has no {date} {time} slot, see /slots")]
    SlotNotOffered {
        doctor: String,
        date: String,
        time: String,
    },
    #[error("Dates look like DD/MM/YYYY, got {0:?}")]
    InvalidDate(String),
    #[error("{0} is in the past")]
    DateInPast(String),
    #[error("Please pick a time")]
    MissingTime,
    #[error("Appointment {0} has already taken place")]
    AppointmentCompleted(String),
}

pub fn parse_slot_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), SLOT_DATE_FORMAT).ok()
}

/// Status of `date`/`time` for `doctor` as seen on `today`
///
/// Dates that don't parse are treated as open.
pub fn slot_status(doctor: &DoctorRecord, date: &str, time: &str, today: NaiveDate) -> SlotStatus {
    let booked = doctor
        .booked_slots
        .get(date)
        .is_some_and(|times| times.iter().any(|t| t == time));
    if booked {
        return SlotStatus::Booked;
    }
    match parse_slot_date(date) {
        Some(day) if day < today => SlotStatus::Past,
        _ => SlotStatus::Open,
    }
}

/// Every advertised slot with its status, earliest date first
pub fn all_slots(doctor: &DoctorRecord, today: NaiveDate) -> Vec<Slot> {
    let mut days: Vec<(&String, &Vec<String>)> = doctor.available_slots.iter().collect();
    // Unparseable dates sort last, in their original order
    days.sort_by_key(|(date, _)| {
        let parsed = parse_slot_date(date);
        (parsed.is_none(), parsed)
    });

    days.into_iter()
        .flat_map(|(date, times)| {
            times.iter().map(move |time| Slot {
                date: date.clone(),
                time: time.clone(),
                status: slot_status(doctor, date, time, today),
            })
        })
        .collect()
}

/// Slots a patient can still book
pub fn open_slots(doctor: &DoctorRecord, today: NaiveDate) -> Vec<Slot> {
    all_slots(doctor, today)
        .into_iter()
        .filter(|slot| slot.status == SlotStatus::Open)
        .collect()
}

/// The advertised slot at `date`/`time`, if it can still be booked
pub fn resolve_slot(
    doctor: &DoctorRecord,
    date: &str,
    time: &str,
    today: NaiveDate,
) -> Result<Slot, BookingError> {
    let slot = all_slots(doctor, today)
        .into_iter()
        .find(|s| s.date == date && s.time == time)
        .ok_or_else(|| BookingError::SlotNotOffered {
            doctor: doctor.name.clone(),
            date: date.to_string(),
            time: time.to_string(),
        })?;
    if slot.status != SlotStatus::Open {
        return Err(BookingError::SlotUnavailable {
            date: slot.date,
            time: slot.time,
        });
    }
    Ok(slot)
}

/// Patient details entered before booking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingForm {
    pub name: String,
    pub phone: String,
    pub age: String,
    pub location: String,
}

impl BookingForm {
    /// Validate the form against the chosen slot and build the request
    pub fn into_request(
        self,
        doctor: &DoctorRecord,
        slot: Option<&Slot>,
        today: NaiveDate,
    ) -> Result<AppointmentRequest, BookingError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(BookingError::MissingName);
        }
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err(BookingError::MissingPhone);
        }
        let age = self.age.trim();
        let age = if age.is_empty() {
            0
        } else {
            age.parse::<u32>()
                .map_err(|_| BookingError::InvalidAge(self.age.clone()))?
        };
        let slot = slot.ok_or(BookingError::MissingSlot)?;
        if slot_status(doctor, &slot.date, &slot.time, today) != SlotStatus::Open {
            return Err(BookingError::SlotUnavailable {
                date: slot.date.clone(),
                time: slot.time.clone(),
            });
        }

        Ok(AppointmentRequest {
            user_name: name.to_string(),
            phone: phone.to_string(),
            age,
            location: self.location.trim().to_string(),
            doctor_name: doctor.name.clone(),
            specialization: doctor.specialization.clone(),
            date: slot.date.clone(),
            time: slot.time.clone(),
            amount: fee_amount(&doctor.fee),
            contact: doctor.contact.clone(),
        })
    }
}

// ============================================================================
// Booked appointments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentTiming {
    Upcoming,
    Completed,
    /// Date did not parse
    Unknown,
}

impl AppointmentTiming {
    pub fn label(self) -> &'static str {
        match self {
            AppointmentTiming::Upcoming => "upcoming",
            AppointmentTiming::Completed => "completed",
            AppointmentTiming::Unknown => "unknown date",
        }
    }
}

/// Appointments on `today` still count as upcoming
pub fn appointment_timing(appointment: &StoredAppointment, today: NaiveDate) -> AppointmentTiming {
    match parse_slot_date(&appointment.date) {
        Some(day) if day < today => AppointmentTiming::Completed,
        Some(_) => AppointmentTiming::Upcoming,
        None => AppointmentTiming::Unknown,
    }
}

/// Only upcoming appointments may be cancelled or moved
pub fn ensure_upcoming(appointment: &StoredAppointment, today: NaiveDate) -> Result<(), BookingError> {
    match appointment_timing(appointment, today) {
        AppointmentTiming::Completed => {
            Err(BookingError::AppointmentCompleted(appointment.id.clone()))
        }
        AppointmentTiming::Upcoming | AppointmentTiming::Unknown => Ok(()),
    }
}

/// Validate a new date and time for an existing appointment
pub fn reschedule_request(
    date: &str,
    time: &str,
    today: NaiveDate,
) -> Result<RescheduleRequest, BookingError> {
    let date = date.trim();
    let day = parse_slot_date(date).ok_or_else(|| BookingError::InvalidDate(date.to_string()))?;
    if day < today {
        return Err(BookingError::DateInPast(date.to_string()));
    }
    let time = time.trim();
    if time.is_empty() {
        return Err(BookingError::MissingTime);
    }
    Ok(RescheduleRequest {
        date: date.to_string(),
        time: time.to_string(),
    })
}

/// Whole-number fee from the free-form fee field; 0 when absent
fn fee_amount(fee: &str) -> u32 {
    let digits: String = fee
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}
