//! Time formatting helpers.

use dualgov_types::Duration;

/// Render a duration the way phase timers are usually read: the two most
/// significant units.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        assert_eq!(format_duration(Duration::new(42)), "42s");
        assert_eq!(format_duration(Duration::from_minutes(5)), "5m 0s");
        assert_eq!(format_duration(Duration::from_hours(5)), "5h 0m");
        assert_eq!(
            format_duration(Duration::new(Duration::from_days(16).as_secs() + 43_200)),
            "16d 12h"
        );
    }
}
