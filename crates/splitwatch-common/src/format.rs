//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Shared primitives and utilities for the core runtime."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Elapsed-time rendering shared by the terminal display and record labels.

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_SECOND: u64 = 1_000;

/// Hours, minutes, seconds and centiseconds of a millisecond value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParts {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub centis: u64,
}

impl DurationParts {
    /// Split using integer division only; hours are unbounded.
    pub fn from_millis(ms: u64) -> Self {
        Self {
            hours: ms / MS_PER_HOUR,
            minutes: (ms % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (ms % MS_PER_MINUTE) / MS_PER_SECOND,
            centis: (ms % MS_PER_SECOND) / 10,
        }
    }
}

/// Render `ms` as `HH:MM:SS.mm`, or `HH:MM:SS` when `with_centis` is false.
pub fn format_duration(ms: u64, with_centis: bool) -> String {
    let parts = DurationParts::from_millis(ms);
    if with_centis {
        format!(
            "{:02}:{:02}:{:02}.{:02}",
            parts.hours, parts.minutes, parts.seconds, parts.centis
        )
    } else {
        format!("{:02}:{:02}:{:02}", parts.hours, parts.minutes, parts.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_renders_both_forms() {
        assert_eq!(format_duration(0, true), "00:00:00.00");
        assert_eq!(format_duration(0, false), "00:00:00");
    }

    #[test]
    fn mixed_components() {
        assert_eq!(format_duration(3_661_230, true), "01:01:01.23");
        assert_eq!(format_duration(3_661_230, false), "01:01:01");
    }

    #[test]
    fn centiseconds_truncate() {
        assert_eq!(format_duration(999, true), "00:00:00.99");
        assert_eq!(format_duration(1_009, true), "00:00:01.00");
    }

    #[test]
    fn hours_exceed_two_digits() {
        assert_eq!(format_duration(100 * MS_PER_HOUR + 59_990, true), "100:00:59.99");
    }
}
