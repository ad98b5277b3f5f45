/// Format a millisecond offset as `mm:ss`, switching to `hh:mm:ss` once the
/// minute count goes past 60.
pub fn format_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    let (mins, secs) = (total_secs / 60, total_secs % 60);
    if mins > 60 {
        let (hours, mins) = (mins / 60, mins % 60);
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Same as [`format_clock`] for a whole-second count.
pub fn format_secs(secs: u32) -> String {
    format_clock(u64::from(secs) * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_offsets_use_minutes() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(125_000), "02:05");
        assert_eq!(format_clock(999), "00:00");
    }

    #[test]
    fn test_exactly_one_hour_stays_in_minutes() {
        assert_eq!(format_clock(3_600_000), "60:00");
        assert_eq!(format_clock(3_659_000), "60:59");
    }

    #[test]
    fn test_long_offsets_escalate_to_hours() {
        assert_eq!(format_clock(3_725_000), "01:02:05");
        assert_eq!(format_clock(3_660_000), "01:01:00");
        assert_eq!(format_clock(36_000_000), "10:00:00");
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(900), "15:00");
        assert_eq!(format_secs(59), "00:59");
    }
}
