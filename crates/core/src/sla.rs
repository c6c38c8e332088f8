use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlaStatus {
    OnTime,
    AtRisk,
    Breached,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTime => "on-time",
            Self::AtRisk => "at-risk",
            Self::Breached => "breached",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaAssessment {
    pub status: SlaStatus,
    pub time_remaining: String,
}

pub fn default_warning_window() -> Duration {
    Duration::hours(24)
}

/// Classify a due date against the clock. Pure function of its inputs;
/// recomputed on every read so the classification never goes stale.
pub fn evaluate(
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_window: Duration,
) -> SlaAssessment {
    let remaining = due_date - now;

    let status = if remaining < Duration::zero() {
        SlaStatus::Breached
    } else if remaining <= warning_window {
        SlaStatus::AtRisk
    } else {
        SlaStatus::OnTime
    };

    SlaAssessment { status, time_remaining: format_remaining(remaining) }
}

/// Variant for untrusted input. An unparsable due date fails closed to
/// on-time with a logged warning so a list view is never blocked by one
/// bad record.
pub fn evaluate_raw(due_date: &str, now: DateTime<Utc>, warning_window: Duration) -> SlaAssessment {
    match DateTime::parse_from_rfc3339(due_date.trim()) {
        Ok(parsed) => evaluate(parsed.with_timezone(&Utc), now, warning_window),
        Err(error) => {
            tracing::warn!(
                event_name = "sla.unparsable_due_date",
                due_date = %due_date,
                error = %error,
                "falling back to on-time classification"
            );
            SlaAssessment { status: SlaStatus::OnTime, time_remaining: "unknown".to_string() }
        }
    }
}

fn format_remaining(remaining: Duration) -> String {
    if remaining < Duration::zero() {
        format!("Overdue by {}", format_span(-remaining))
    } else {
        format_span(remaining)
    }
}

/// Largest two units, floored to minutes: "1d 6h", "2h 30m", "45m".
fn format_span(span: Duration) -> String {
    let total_minutes = span.num_minutes();
    if total_minutes < 1 {
        return "under 1m".to_string();
    }

    let days = span.num_days();
    let hours = span.num_hours() - days * 24;
    let minutes = total_minutes - span.num_hours() * 60;

    if days > 0 {
        if hours > 0 {
            format!("{days}d {hours}h")
        } else {
            format!("{days}d")
        }
    } else if span.num_hours() > 0 {
        if minutes > 0 {
            format!("{}h {minutes}m", span.num_hours())
        } else {
            format!("{}h", span.num_hours())
        }
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{default_warning_window, evaluate, evaluate_raw, SlaStatus};

    fn reference_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).single().expect("valid timestamp")
    }

    #[test]
    fn past_due_date_is_breached() {
        let now = reference_time();
        let assessment = evaluate(now - Duration::hours(1), now, default_warning_window());

        assert_eq!(assessment.status, SlaStatus::Breached);
        assert_eq!(assessment.time_remaining, "Overdue by 1h");
    }

    #[test]
    fn due_date_inside_warning_window_is_at_risk() {
        let now = reference_time();
        let assessment = evaluate(now + Duration::hours(2), now, Duration::hours(4));

        assert_eq!(assessment.status, SlaStatus::AtRisk);
        assert_eq!(assessment.time_remaining, "2h");
    }

    #[test]
    fn distant_due_date_is_on_time() {
        let now = reference_time();
        let assessment = evaluate(now + Duration::days(2), now, default_warning_window());

        assert_eq!(assessment.status, SlaStatus::OnTime);
        assert_eq!(assessment.time_remaining, "2d");
    }

    #[test]
    fn evaluation_is_deterministic_for_fixed_inputs() {
        let now = reference_time();
        let due = now + Duration::hours(30);

        let first = evaluate(due, now, default_warning_window());
        let second = evaluate(due, now, default_warning_window());

        assert_eq!(first, second);
        assert_eq!(first.time_remaining, "1d 6h");
    }

    #[test]
    fn remaining_time_formats_cover_minute_granularity() {
        let now = reference_time();

        assert_eq!(
            evaluate(now + Duration::minutes(45), now, Duration::hours(4)).time_remaining,
            "45m"
        );
        assert_eq!(
            evaluate(now + Duration::minutes(150), now, Duration::hours(4)).time_remaining,
            "2h 30m"
        );
        assert_eq!(
            evaluate(now - Duration::minutes(30), now, Duration::hours(4)).time_remaining,
            "Overdue by 30m"
        );
        assert_eq!(
            evaluate(now + Duration::seconds(20), now, Duration::hours(4)).time_remaining,
            "under 1m"
        );
    }

    #[test]
    fn unparsable_due_date_fails_closed_to_on_time() {
        let now = reference_time();
        let assessment = evaluate_raw("not-a-date", now, default_warning_window());

        assert_eq!(assessment.status, SlaStatus::OnTime);
        assert_eq!(assessment.time_remaining, "unknown");
    }

    #[test]
    fn raw_evaluation_parses_rfc3339_input() {
        let now = reference_time();
        let assessment = evaluate_raw("2026-08-20T11:00:00Z", now, default_warning_window());

        assert_eq!(assessment.status, SlaStatus::Breached);
    }

    #[test]
    fn labels_serialize_in_kebab_case() {
        assert_eq!(serde_json::to_string(&SlaStatus::OnTime).expect("serialize"), "\"on-time\"");
        assert_eq!(SlaStatus::AtRisk.as_str(), "at-risk");
        assert_eq!(SlaStatus::Breached.as_str(), "breached");
    }
}
