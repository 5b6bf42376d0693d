//! Daily order numbering in the shop's local calendar.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::domain::order::OrderNumber;

#[derive(Clone, Copy, Debug)]
pub struct OrderNumberAllocator {
    timezone: Tz,
}

impl OrderNumberAllocator {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Local calendar date of `now`; order numbers are unique within it.
    pub fn local_day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Start of the local calendar day containing `now`, as a UTC instant.
    pub fn day_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = self.local_day(now).and_time(NaiveTime::MIN);

        // Zones that skip midnight on a DST switch start the day at the first valid instant.
        let start = self
            .timezone
            .from_local_datetime(&midnight)
            .earliest()
            .or_else(|| self.timezone.from_local_datetime(&(midnight + Duration::hours(1))).earliest());

        match start {
            Some(start) => start.with_timezone(&Utc),
            None => midnight.and_utc(),
        }
    }

    /// `orders_today` is the number of orders created after the local day start;
    /// `offset` skips numbers already taken when a previous attempt collided.
    pub fn allocate(&self, now: DateTime<Utc>, orders_today: u64, offset: u64) -> OrderNumber {
        let local = now.with_timezone(&self.timezone);
        OrderNumber::new(orders_today + 1 + offset, local.month(), local.year())
    }
}
