//! Text heuristics the state machine relies on
//!
//! Both the termination gate and the doctor-visibility gate go through
//! `is_affirmative`, so changing the wording policy happens here only.

use crate::backend::Turn;
use regex::Regex;
use std::sync::LazyLock;

/// Number of trailing transcript entries checked for echoes
pub const ECHO_WINDOW: usize = 4;

static AFFIRMATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)doctor|yes|suggest").expect("static pattern"));

/// The user is agreeing or asking to be pointed at a doctor
pub fn is_affirmative(text: &str) -> bool {
    AFFIRMATIVE.is_match(text)
}

/// Any user turn so far asked for doctors. Monotonic: the transcript only grows.
pub fn doctors_visible(transcript: &[Turn]) -> bool {
    transcript
        .iter()
        .any(|turn| turn.is_user() && is_affirmative(&turn.message))
}

/// `candidate` matches (case-insensitively) one of the last `ECHO_WINDOW` entries
pub fn is_recent_echo(transcript: &[Turn], candidate: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let start = transcript.len().saturating_sub(ECHO_WINDOW);
    transcript[start..]
        .iter()
        .any(|turn| turn.message.to_lowercase() == candidate)
}
