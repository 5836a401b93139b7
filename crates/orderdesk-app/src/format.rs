// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    Expired(i64),
    DueToday,
    DueSoon(i64),
    Normal(i64),
}

impl DueStatus {
    /// Days are rounded up, so anything due later today counts as one day out.
    pub fn from_due(due: OffsetDateTime, now: OffsetDateTime) -> Self {
        let days = ceil_days(due - now);
        match days {
            days if days < 0 => Self::Expired(-days),
            0 => Self::DueToday,
            days if days <= 3 => Self::DueSoon(days),
            days => Self::Normal(days),
        }
    }

    pub fn text(self) -> String {
        match self {
            Self::Expired(days) => format!("expired ({days}d past due date)"),
            Self::DueToday => "due today".to_owned(),
            Self::DueSoon(days) | Self::Normal(days) => format!("{days}d to due date"),
        }
    }

    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::Expired(_) | Self::DueToday)
    }
}

pub fn relative_time(then: OffsetDateTime, now: OffsetDateTime) -> String {
    let elapsed = now - then;
    if elapsed.whole_days() > 0 {
        format!("{}d ago", elapsed.whole_days())
    } else if elapsed.whole_hours() > 0 {
        format!("{}h ago", elapsed.whole_hours())
    } else if elapsed.whole_minutes() > 0 {
        format!("{}m ago", elapsed.whole_minutes())
    } else {
        "Just now".to_owned()
    }
}

fn ceil_days(span: Duration) -> i64 {
    let whole = span.whole_days();
    if span > Duration::days(whole) {
        whole + 1
    } else {
        whole
    }
}

#[cfg(test)]
mod tests {
    use super::{DueStatus, relative_time};
    use time::Duration;
    use time::macros::datetime;

    #[test]
    fn due_status_buckets() {
        let now = datetime!(2024-01-15 12:00 UTC);
        assert_eq!(
            DueStatus::from_due(now - Duration::days(2), now),
            DueStatus::Expired(2)
        );
        assert_eq!(DueStatus::from_due(now, now), DueStatus::DueToday);
        assert_eq!(
            DueStatus::from_due(now + Duration::hours(5), now),
            DueStatus::DueSoon(1)
        );
        assert_eq!(
            DueStatus::from_due(now + Duration::days(3), now),
            DueStatus::DueSoon(3)
        );
        assert_eq!(
            DueStatus::from_due(now + Duration::days(9), now),
            DueStatus::Normal(9)
        );
    }

    #[test]
    fn due_status_text() {
        assert_eq!(DueStatus::Expired(4).text(), "expired (4d past due date)");
        assert_eq!(DueStatus::DueToday.text(), "due today");
        assert_eq!(DueStatus::DueSoon(2).text(), "2d to due date");
        assert!(DueStatus::DueToday.is_urgent());
        assert!(!DueStatus::Normal(8).is_urgent());
    }

    #[test]
    fn relative_time_picks_largest_unit() {
        let now = datetime!(2024-01-15 12:00 UTC);
        assert_eq!(relative_time(now - Duration::days(3), now), "3d ago");
        assert_eq!(relative_time(now - Duration::hours(5), now), "5h ago");
        assert_eq!(relative_time(now - Duration::minutes(12), now), "12m ago");
        assert_eq!(relative_time(now - Duration::seconds(20), now), "Just now");
        assert_eq!(relative_time(now + Duration::hours(1), now), "Just now");
    }
}
