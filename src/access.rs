//! Access Control Evaluator: every active/expiring/remaining-time decision in
//! the system goes through these functions, so there is exactly one notion of
//! "inside the rental window".

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Rental, RentalKind, RentalStatus};

/// How close to `ends_at` a rental must be before the expiry warning fires.
pub fn expiry_warning_threshold() -> Duration {
    Duration::hours(2)
}

/// True iff the rental is in status `Active` and `now` falls inside its
/// [starts_at, ends_at] window.
pub fn is_active(rental: &Rental, now: DateTime<Utc>) -> bool {
    rental.status == RentalStatus::Active && rental.starts_at <= now && now <= rental.ends_at
}

/// Time left on the rental; zero whenever the rental is not currently active.
pub fn remaining(rental: &Rental, now: DateTime<Utc>) -> Duration {
    if !is_active(rental, now) {
        return Duration::zero();
    }
    rental.ends_at - now
}

/// True iff the rental is active and will expire within `threshold` of `now`.
pub fn is_expiring_soon(rental: &Rental, now: DateTime<Utc>, threshold: Duration) -> bool {
    rental.status == RentalStatus::Active
        && rental.ends_at >= now
        && rental.ends_at <= now + threshold
}

/// Remaining time rounded up to the unit a viewer of this rental kind thinks
/// in: hours for 48-hour rentals, days for 30-day rentals.
pub fn format_remaining(kind: RentalKind, remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    match kind {
        RentalKind::FortyEightHours => {
            let hours = (secs + 3599) / 3600;
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        }
        RentalKind::ThirtyDays => {
            let days = (secs + 86_399) / 86_400;
            format!("{} day{}", days, if days == 1 { "" } else { "s" })
        }
    }
}

/// Whole hours left, rounded up. Used for the expiry-warning message body.
pub fn remaining_hours(rental: &Rental, now: DateTime<Utc>) -> i64 {
    let secs = remaining(rental, now).num_seconds();
    (secs + 3599) / 3600
}
