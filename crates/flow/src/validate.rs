//! Pure validation and normalization utilities.
//!
//! Everything here is deterministic and idempotent: same input, same
//! output, no I/O. These functions are the reason the handler-owned
//! session fields can be trusted over anything an LLM produces.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

static FIVE_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})\b").expect("static regex"));

static PHONE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s\-\+\(\)\.]{7,}$").expect("static regex"));

static WORD_OR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bor\b").expect("static regex"));

/// Phrases callers (and sloppy upstream systems) use for "no value".
const SENTINELS: &[&str] = &["not provided", "n/a", "na", "unknown", "no", "none", "null"];

/// Spoken-number words accepted in ZIPs and street numbers.
pub fn small_number_to_digits(word: &str) -> Option<&'static str> {
    Some(match word.to_ascii_lowercase().as_str() {
        "zero" | "oh" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "ten" => "10",
        "eleven" => "11",
        "twelve" => "12",
        "thirteen" => "13",
        "fourteen" => "14",
        "fifteen" => "15",
        "sixteen" => "16",
        "seventeen" => "17",
        "eighteen" => "18",
        "nineteen" => "19",
        _ => return None,
    })
}

fn is_sentinel(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    SENTINELS.contains(&lowered.as_str())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Field validators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extract a 5-digit ZIP from free text, or return the empty string.
///
/// Accepts a literal 5-digit token, or spoken digits ("seven eight
/// seven zero one") concatenated and length-checked.
pub fn validate_zip(text: &str) -> String {
    if let Some(m) = FIVE_DIGIT.captures(text) {
        return m[1].to_owned();
    }

    let mut digits = String::new();
    for token in text.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        if token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty() {
            digits.push_str(token);
        } else if let Some(d) = small_number_to_digits(token) {
            digits.push_str(d);
        }
        if digits.len() > 5 {
            return String::new();
        }
    }

    if digits.len() == 5 {
        digits
    } else {
        String::new()
    }
}

/// Validate a customer name, or return the empty string.
///
/// Rejects sentinel phrases, pure digit strings, and phone-number
/// shaped input (the STT loves handing us the caller ID back).
pub fn validate_name(text: &str) -> String {
    let stripped = text.trim();
    if stripped.is_empty() || is_sentinel(stripped) {
        return String::new();
    }
    if stripped.chars().all(|c| c.is_ascii_digit()) {
        return String::new();
    }
    if PHONE_LIKE.is_match(stripped) {
        return String::new();
    }
    stripped.to_owned()
}

/// Validate and normalize a street address, or return the empty string.
///
/// Rejects sentinels and anything containing the word "or" (two
/// alternatives is not an address). Normalizes a leading spoken-number
/// run: "53 Eleven Maple St" becomes "5311 Maple St". Results must
/// contain a letter and be at least 5 characters.
pub fn validate_address(text: &str) -> String {
    let stripped = text.trim();
    if stripped.is_empty() || is_sentinel(stripped) {
        return String::new();
    }
    if WORD_OR.is_match(stripped) {
        return String::new();
    }

    let normalized = normalize_leading_number_run(stripped);

    if !normalized.chars().any(|c| c.is_alphabetic()) {
        return String::new();
    }
    if normalized.len() < 5 {
        return String::new();
    }
    normalized
}

/// Concatenate a leading run of digit tokens and number words into a
/// single street number. Tokens after the run are left untouched.
fn normalize_leading_number_run(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut number = String::new();
    let mut consumed = 0;

    for token in &tokens {
        if token.chars().all(|c| c.is_ascii_digit()) {
            number.push_str(token);
            consumed += 1;
        } else if let Some(d) = small_number_to_digits(token) {
            number.push_str(d);
            consumed += 1;
        } else {
            break;
        }
    }

    // A run of one digit token needs no rewrite.
    if consumed < 2 {
        return text.to_owned();
    }

    let rest = tokens[consumed..].join(" ");
    if rest.is_empty() {
        number
    } else {
        format!("{number} {rest}")
    }
}

/// Is this 5-digit ZIP inside the service area?
pub fn is_service_area(zip5: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| zip5.starts_with(p.as_str()))
}

/// Word-boundary keyword match over free text. Never a substring match:
/// "no" does not match "know".
pub fn match_any_keyword(text: &str, keywords: &[&str]) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?i)\b(?:{alternation})\b");
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            tracing::warn!(error = %e, "keyword pattern failed to compile");
            false
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Booking-time resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ASAP_KEYWORDS: &[&str] = &[
    "asap",
    "today",
    "right away",
    "soonest",
    "right now",
    "as soon as possible",
    "same day",
    "morning",
];

/// Resolve a caller's spoken time preference to a concrete ISO-8601
/// local timestamp in the given timezone. Total: every input maps to a
/// parseable slot, with "next day 09:00" as the fallback.
pub fn resolve_booking_time(free_text: &str, now_utc: DateTime<Utc>, tz: Tz) -> String {
    let local = now_utc.with_timezone(&tz);
    let text = free_text.trim();

    let slot = if match_any_keyword(text, ASAP_KEYWORDS) {
        let in_two = (local + Duration::hours(2))
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local);
        if in_two.hour() >= 18 || in_two.hour() < 9 {
            next_business_day_at(local, 9)
        } else {
            in_two
        }
    } else if match_any_keyword(text, &["tomorrow"]) {
        day_after_at(local, 1, 9)
    } else if match_any_keyword(text, &["afternoon"]) {
        if local.hour() < 14 {
            at_hour(local, 14)
        } else {
            day_after_at(local, 1, 14)
        }
    } else {
        // "this week", "whenever", empty, unknown.
        day_after_at(local, 1, 9)
    };

    slot.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

fn at_hour(local: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    local
        .timezone()
        .with_ymd_and_hms(local.year(), local.month(), local.day(), hour, 0, 0)
        .single()
        .unwrap_or(local)
}

fn day_after_at(local: DateTime<Tz>, days: i64, hour: u32) -> DateTime<Tz> {
    let d = local + Duration::days(days);
    at_hour(d, hour)
}

/// The next weekday morning: Friday evening rolls to Monday.
fn next_business_day_at(local: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let mut d = local + Duration::days(1);
    while matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
        d += Duration::days(1);
    }
    at_hour(d, hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Chicago;

    fn chicago(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Chicago
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    // ── validate_zip ─────────────────────────────────────────────

    #[test]
    fn zip_literal_five_digits() {
        assert_eq!(validate_zip("78701"), "78701");
        assert_eq!(validate_zip("it's 78701 I think"), "78701");
    }

    #[test]
    fn zip_spelled_digits() {
        assert_eq!(validate_zip("seven eight seven zero one"), "78701");
        assert_eq!(validate_zip("seven eight seven oh one"), "78701");
    }

    #[test]
    fn zip_rejects_wrong_lengths() {
        assert_eq!(validate_zip("7870"), "");
        assert_eq!(validate_zip("787011"), "");
        assert_eq!(validate_zip("seven eight seven"), "");
        assert_eq!(validate_zip("no idea"), "");
    }

    // ── validate_name ────────────────────────────────────────────

    #[test]
    fn name_accepts_ordinary_names() {
        assert_eq!(validate_name(" Jonas "), "Jonas");
        assert_eq!(validate_name("Mary Beth O'Hara"), "Mary Beth O'Hara");
    }

    #[test]
    fn name_rejects_sentinels_and_numbers() {
        assert_eq!(validate_name("not provided"), "");
        assert_eq!(validate_name("N/A"), "");
        assert_eq!(validate_name("unknown"), "");
        assert_eq!(validate_name("no"), "");
        assert_eq!(validate_name("12345"), "");
        assert_eq!(validate_name("(512) 555-1234"), "");
    }

    // ── validate_address ─────────────────────────────────────────

    #[test]
    fn address_normalizes_leading_number_words() {
        assert_eq!(validate_address("53 Eleven Maple St"), "5311 Maple St");
        assert_eq!(
            validate_address("four three two nine Franklin Street"),
            "4329 Franklin Street"
        );
    }

    #[test]
    fn address_leaves_single_number_alone() {
        assert_eq!(validate_address("4329 Franklin St"), "4329 Franklin St");
    }

    #[test]
    fn address_rejects_alternatives_and_junk() {
        assert_eq!(validate_address("Maple St or Oak Ave"), "");
        assert_eq!(validate_address("unknown"), "");
        assert_eq!(validate_address("12345"), "");
        assert_eq!(validate_address("5 St"), "");
    }

    #[test]
    fn address_is_idempotent() {
        for input in ["53 Eleven Maple St", "4329 Franklin Street", "12 Oak Lane"] {
            let once = validate_address(input);
            assert!(!once.is_empty());
            assert_eq!(validate_address(&once), once);
        }
    }

    // ── is_service_area / match_any_keyword ──────────────────────

    #[test]
    fn service_area_is_prefix_based() {
        let prefixes = vec!["787".to_string()];
        assert!(is_service_area("78701", &prefixes));
        assert!(!is_service_area("78641", &prefixes));
    }

    #[test]
    fn keyword_match_requires_word_boundaries() {
        assert!(match_any_keyword("No, nothing like that", &["no", "none"]));
        assert!(!match_any_keyword("I know the drill", &["no"]));
        assert!(match_any_keyword("book it ASAP please", &["asap"]));
    }

    // ── resolve_booking_time ─────────────────────────────────────

    #[test]
    fn asap_mid_morning_is_two_hours_out() {
        // 10:15 local -> 12:00 local.
        let now = chicago(2026, 2, 24, 10, 15);
        let slot = resolve_booking_time("ASAP", now, Chicago);
        assert!(slot.starts_with("2026-02-24T12:00:00"), "{slot}");
    }

    #[test]
    fn asap_in_the_evening_rolls_to_next_morning() {
        // 19:00 local Tuesday -> Wednesday 09:00.
        let now = chicago(2026, 2, 24, 19, 0);
        let slot = resolve_booking_time("ASAP", now, Chicago);
        assert!(slot.starts_with("2026-02-25T09:00:00"), "{slot}");
    }

    #[test]
    fn asap_friday_evening_rolls_to_monday() {
        // Friday 2026-02-27 19:00 -> Monday 2026-03-02 09:00.
        let now = chicago(2026, 2, 27, 19, 0);
        let slot = resolve_booking_time("right now", now, Chicago);
        assert!(slot.starts_with("2026-03-02T09:00:00"), "{slot}");
    }

    #[test]
    fn tomorrow_is_next_day_nine() {
        let now = chicago(2026, 2, 24, 16, 40);
        let slot = resolve_booking_time("tomorrow works", now, Chicago);
        assert!(slot.starts_with("2026-02-25T09:00:00"), "{slot}");
    }

    #[test]
    fn afternoon_depends_on_current_hour() {
        let morning = chicago(2026, 2, 24, 9, 0);
        let slot = resolve_booking_time("sometime this afternoon", morning, Chicago);
        assert!(slot.starts_with("2026-02-24T14:00:00"), "{slot}");

        let late = chicago(2026, 2, 24, 15, 0);
        let slot = resolve_booking_time("afternoon", late, Chicago);
        assert!(slot.starts_with("2026-02-25T14:00:00"), "{slot}");
    }

    #[test]
    fn unknown_input_falls_back_to_next_day() {
        let now = chicago(2026, 2, 24, 11, 0);
        for text in ["this week", "whenever", "", "gibberish"] {
            let slot = resolve_booking_time(text, now, Chicago);
            assert!(slot.starts_with("2026-02-25T09:00:00"), "{text}: {slot}");
        }
    }

    #[test]
    fn resolution_is_total_and_parseable() {
        let now = chicago(2026, 2, 24, 11, 0);
        for text in ["asap", "tomorrow", "afternoon", "", "next tuesday", "???"] {
            let slot = resolve_booking_time(text, now, Chicago);
            assert!(
                DateTime::parse_from_rfc3339(&slot).is_ok(),
                "{text} -> {slot}"
            );
        }
    }
}
