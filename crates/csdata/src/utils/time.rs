use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// `HHMMSS_MMDDYYYY` label used to name the files of one request.
#[must_use]
pub fn request_label(now: OffsetDateTime) -> String {
    let format = format_description!("[hour][minute][second]_[month][day][year]");
    now.format(&format).unwrap_or_else(|_| {
        format!(
            "{:02}{:02}{:02}_{:02}{:02}{:04}",
            now.hour(),
            now.minute(),
            now.second(),
            u8::from(now.month()),
            now.day(),
            now.year()
        )
    })
}

/// Local time when the offset can be determined, UTC otherwise.
#[must_use]
pub fn now_local() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    UtcOffset::current_local_offset().map_or(now, |offset| now.to_offset(offset))
}

#[cfg(test)]
mod tests {
    use super::request_label;
    use time::macros::datetime;

    #[test]
    fn formats_time_then_month_day_year() {
        let label = request_label(datetime!(2026-02-05 07:00:03 UTC));
        assert_eq!(label, "070003_02052026");
    }
}
