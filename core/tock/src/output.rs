//! Terminal output: every user-facing line is prefixed with local `HH:MM:`.

use chrono::Local;
use std::fmt::Display;

pub fn stamp(message: impl Display) -> String {
    format!("{}: {}", Local::now().format("%H:%M"), message)
}

pub fn say(message: impl Display) {
    println!("{}", stamp(message));
}

/// Formats seconds as `[H:]MM:SS`.
pub fn clock(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.abs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}{}:{:02}:{:02}", sign, h, m, s)
    } else {
        format!("{}{:02}:{:02}", sign, m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock() {
        assert_eq!(clock(0), "00:00");
        assert_eq!(clock(1500), "25:00");
        assert_eq!(clock(3725), "1:02:05");
        assert_eq!(clock(-61), "-01:01");
    }

    #[test]
    fn test_stamp_prefix() {
        let line = stamp("Starting.");
        assert_eq!(line.len(), "HH:MM: Starting.".len());
        assert_eq!(&line[2..3], ":");
        assert!(line.ends_with(": Starting."));
    }
}
