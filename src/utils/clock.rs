use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Asia/Jakarta (WIB). Indonesia has no daylight saving time.
pub const SCHOOL_UTC_OFFSET_SECS: i32 = 7 * 3600;

pub fn school_offset() -> FixedOffset {
    FixedOffset::east_opt(SCHOOL_UTC_OFFSET_SECS).expect("UTC+7 is a valid offset")
}

pub fn jakarta_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&school_offset())
}

/// Calendar day in the school timezone; subscription and attendance dates use this.
pub fn today() -> NaiveDate {
    jakarta_now().date_naive()
}

pub fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&school_offset()).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_date_crosses_midnight_before_utc() {
        // 18:30 UTC is already 01:30 the next day in Jakarta
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 18, 30, 0).unwrap();
        assert_eq!(local_date(at), NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());

        let at = Utc.with_ymd_and_hms(2026, 3, 9, 16, 59, 59).unwrap();
        assert_eq!(local_date(at), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    }
}
