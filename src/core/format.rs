//! Rendering an item date with user-chosen separators.

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDateTime, Timelike};

/// Which parts of the timestamp are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Both,
    DateOnly,
    TimeOnly,
    /// Date-only and time-only were both requested: nothing is printed.
    Neither,
}

impl Mode {
    pub fn from_flags(date_only: bool, time_only: bool) -> Self {
        match (date_only, time_only) {
            (false, false) => Self::Both,
            (true, false) => Self::DateOnly,
            (false, true) => Self::TimeOnly,
            (true, true) => Self::Neither,
        }
    }

    /// Key used in the config file.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::DateOnly => "date",
            Self::TimeOnly => "time",
            Self::Neither => "none",
        }
    }

    pub fn from_config_key(s: &str) -> Option<Self> {
        match s {
            "both" => Some(Self::Both),
            "date" => Some(Self::DateOnly),
            "time" => Some(Self::TimeOnly),
            "none" => Some(Self::Neither),
            _ => None,
        }
    }

    fn shows_date(self) -> bool {
        matches!(self, Self::Both | Self::DateOnly)
    }

    fn shows_time(self) -> bool {
        matches!(self, Self::Both | Self::TimeOnly)
    }
}

/// Output layout. Field order is fixed (year month day hour minute second);
/// only the separators and the mode are configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pub date_separator: String,
    pub time_separator: String,
    pub datetime_separator: String,
    pub mode: Mode,
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            date_separator: "-".into(),
            time_separator: ":".into(),
            datetime_separator: " ".into(),
            mode: Mode::Both,
        }
    }
}

impl DateFormat {
    /// `YYYY-MM-DDThh:mm:ss`.
    pub fn iso() -> Self {
        Self {
            datetime_separator: "T".into(),
            ..Self::default()
        }
    }

    /// Switch to the ISO separators, keeping the current mode.
    pub fn apply_iso(&mut self) {
        let mode = self.mode;
        *self = Self { mode, ..Self::iso() };
    }
}

/// Render the local wall-clock time `when` according to `format`.
pub fn format_item_date(when: &NaiveDateTime, format: &DateFormat) -> String {
    let mut out = String::new();
    let mode = format.mode;

    if mode.shows_date() {
        let _ = write!(
            out,
            "{:04}{sep}{:02}{sep}{:02}",
            when.year(),
            when.month(),
            when.day(),
            sep = format.date_separator
        );
    }
    if mode == Mode::Both {
        out.push_str(&format.datetime_separator);
    }
    if mode.shows_time() {
        let _ = write!(
            out,
            "{:02}{sep}{:02}{sep}{:02}",
            when.hour(),
            when.minute(),
            when.second(),
            sep = format.time_separator
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2007, 3, 4)
            .and_then(|d| d.and_hms_opt(5, 6, 7))
            .unwrap()
    }

    #[test]
    fn default_layout_pads_every_field() {
        assert_eq!(format_item_date(&sample(), &DateFormat::default()), "2007-03-04 05:06:07");
    }

    #[test]
    fn iso_layout() {
        assert_eq!(format_item_date(&sample(), &DateFormat::iso()), "2007-03-04T05:06:07");
    }

    #[test]
    fn date_only_and_time_only() {
        let mut format = DateFormat::default();
        format.mode = Mode::DateOnly;
        assert_eq!(format_item_date(&sample(), &format), "2007-03-04");
        format.mode = Mode::TimeOnly;
        assert_eq!(format_item_date(&sample(), &format), "05:06:07");
    }

    #[test]
    fn both_restrictions_print_nothing() {
        let format = DateFormat {
            mode: Mode::from_flags(true, true),
            ..DateFormat::default()
        };
        assert_eq!(format_item_date(&sample(), &format), "");
    }

    #[test]
    fn separators_may_be_empty_or_long() {
        let format = DateFormat {
            date_separator: String::new(),
            time_separator: String::new(),
            datetime_separator: "__".into(),
            mode: Mode::Both,
        };
        assert_eq!(format_item_date(&sample(), &format), "20070304__050607");
    }

    #[test]
    fn apply_iso_keeps_mode() {
        let mut format = DateFormat {
            date_separator: "/".into(),
            mode: Mode::DateOnly,
            ..DateFormat::default()
        };
        format.apply_iso();
        assert_eq!(format.mode, Mode::DateOnly);
        assert_eq!(format_item_date(&sample(), &format), "2007-03-04");
    }

    #[test]
    fn mode_config_keys_round_trip() {
        for mode in [Mode::Both, Mode::DateOnly, Mode::TimeOnly, Mode::Neither] {
            assert_eq!(Mode::from_config_key(mode.config_key()), Some(mode));
        }
        assert_eq!(Mode::from_config_key("sometimes"), None);
    }
}
