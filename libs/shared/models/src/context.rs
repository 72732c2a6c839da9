use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

use crate::auth::User;

/// Per-request inputs the scheduling core needs but must not read from globals:
/// who is calling and what "now" is.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Option<User>,
    pub now: DateTime<Utc>,
    clinic_offset: FixedOffset,
}

impl RequestContext {
    pub fn new(caller: Option<User>, now: DateTime<Utc>) -> Self {
        Self {
            caller,
            now,
            clinic_offset: utc(),
        }
    }

    /// Context for operator or scheduler-triggered work with no end user.
    pub fn system(now: DateTime<Utc>) -> Self {
        Self::new(None, now)
    }

    /// Slot wall-clock times are local to the clinic; out-of-range offsets fall back to UTC.
    pub fn with_clinic_offset_minutes(mut self, minutes: i32) -> Self {
        self.clinic_offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(utc);
        self
    }

    /// Current wall-clock time at the clinic.
    pub fn local_now(&self) -> NaiveDateTime {
        self.now.with_timezone(&self.clinic_offset).naive_local()
    }

    pub fn is_past(&self, date: NaiveDate, time: NaiveTime) -> bool {
        date.and_time(time) < self.local_now()
    }

    pub fn caller_id(&self) -> Option<&str> {
        self.caller.as_ref().map(|user| user.id.as_str())
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn past_check_uses_clinic_wall_clock() {
        let now = Utc.with_ymd_and_hms(2030, 3, 4, 12, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        let utc_ctx = RequestContext::system(now);
        assert!(utc_ctx.is_past(date, ten));

        // UTC-05:00 clinic: it is 07:00 locally, so 10:00 is still ahead
        let local_ctx = RequestContext::system(now).with_clinic_offset_minutes(-300);
        assert!(!local_ctx.is_past(date, ten));
    }
}
