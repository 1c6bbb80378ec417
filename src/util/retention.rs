use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};
use derive_more::{Display, Error};

const KEEP_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Retention policy applied when cycling the backups of one storage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeepPolicy {
    /// Keep the given number of most recent backups.
    Count(usize),
    /// Keep every backup that is not older than the given point in time.
    Since(NaiveDateTime),
}

/// Configured value of a storage's `keep` option.
///
/// Accepts an integer, an absolute timestamp or a relative age such as `30d`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "KeepValue", into = "KeepValue")]
pub enum KeepSetting {
    /// Keep the given number of most recent backups.
    Count(usize),
    /// Keep backups not older than an absolute point in time.
    Since(NaiveDateTime),
    /// Keep backups not older than the given age at cycling time.
    Within(TimeDelta),
}

impl KeepSetting {
    /// Resolve the setting into a [KeepPolicy] relative to `now`.
    ///
    /// Returns [None] if no cycling should happen (`keep = 0`). An age
    /// reaching before the earliest representable time keeps everything.
    pub fn resolve(&self, now: NaiveDateTime) -> Option<KeepPolicy> {
        match *self {
            Self::Count(0) => None,
            Self::Count(count) => Some(KeepPolicy::Count(count)),
            Self::Since(time) => Some(KeepPolicy::Since(time)),
            Self::Within(age) => Some(KeepPolicy::Since(
                now.checked_sub_signed(age).unwrap_or(NaiveDateTime::MIN),
            )),
        }
    }
}

#[derive(Debug, Display, Error)]
#[display("Invalid keep value '{_0}': expected a count, a timestamp (YYYY-MM-DDTHH:MM:SS) or an age like 30d")]
pub struct InvalidKeepSetting(#[error(ignore)] String);

impl FromStr for KeepSetting {
    type Err = InvalidKeepSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(time) = NaiveDateTime::parse_from_str(s, KEEP_TIME_FORMAT) {
            return Ok(Self::Since(time));
        }
        parse_age(s)
            .map(Self::Within)
            .ok_or_else(|| InvalidKeepSetting(s.to_string()))
    }
}

impl fmt::Display for KeepSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Since(time) => write!(f, "{}", time.format(KEEP_TIME_FORMAT)),
            Self::Within(age) if age.num_seconds() % 86_400 == 0 => {
                write!(f, "{}d", age.num_days())
            }
            Self::Within(age) => write!(f, "{}h", age.num_hours()),
        }
    }
}

/// Parse an age like `48h`, `30d`, `2w`, `6m` or `1y`.
///
/// Bare digits are days, a month is 30 days and a year 365 days.
pub fn parse_age(s: &str) -> Option<TimeDelta> {
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let n: i64 = number.parse().ok()?;

    let days = match unit {
        "h" | "H" => return TimeDelta::try_hours(n),
        "" | "d" | "D" => n,
        "w" | "W" => n.checked_mul(7)?,
        "m" | "M" => n.checked_mul(30)?,
        "y" | "Y" => n.checked_mul(365)?,
        _ => return None,
    };
    TimeDelta::try_days(days)
}

#[derive(serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
enum KeepValue {
    Count(usize),
    Text(String),
}

impl TryFrom<KeepValue> for KeepSetting {
    type Error = InvalidKeepSetting;

    fn try_from(value: KeepValue) -> Result<Self, Self::Error> {
        match value {
            KeepValue::Count(count) => Ok(Self::Count(count)),
            KeepValue::Text(text) => text.parse(),
        }
    }
}

impl From<KeepSetting> for KeepValue {
    fn from(setting: KeepSetting) -> Self {
        match setting {
            KeepSetting::Count(count) => Self::Count(count),
            other => Self::Text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn parse_ages() {
        assert_eq!(parse_age("48h"), Some(TimeDelta::hours(48)));
        assert_eq!(parse_age("30d"), Some(TimeDelta::days(30)));
        assert_eq!(parse_age("30"), Some(TimeDelta::days(30)));
        assert_eq!(parse_age("2w"), Some(TimeDelta::days(14)));
        assert_eq!(parse_age("6m"), Some(TimeDelta::days(180)));
        assert_eq!(parse_age("1y"), Some(TimeDelta::days(365)));
        assert_eq!(parse_age(""), None);
        assert_eq!(parse_age("d"), None);
        assert_eq!(parse_age("5x"), None);
    }

    #[test]
    fn parse_keep_settings() {
        assert_eq!("2026-03-10T12:00:00".parse::<KeepSetting>().unwrap(), KeepSetting::Since(at(10)));
        assert_eq!("7d".parse::<KeepSetting>().unwrap(), KeepSetting::Within(TimeDelta::days(7)));
        assert!("yesterday".parse::<KeepSetting>().is_err());
    }

    #[test]
    fn resolve_relative_to_now() {
        assert_eq!(KeepSetting::Count(0).resolve(at(20)), None);
        assert_eq!(KeepSetting::Count(3).resolve(at(20)), Some(KeepPolicy::Count(3)));
        assert_eq!(
            KeepSetting::Within(TimeDelta::days(5)).resolve(at(20)),
            Some(KeepPolicy::Since(at(15)))
        );
    }

    #[test]
    fn huge_age_keeps_everything() {
        let setting: KeepSetting = "999999y".parse().unwrap();
        assert_eq!(
            setting.resolve(at(20)),
            Some(KeepPolicy::Since(NaiveDateTime::MIN))
        );
    }

    #[derive(serde::Deserialize, serde::Serialize)]
    struct Storage {
        keep: KeepSetting,
    }

    #[test]
    fn toml_values() {
        let count: Storage = toml::from_str("keep = 5").unwrap();
        assert_eq!(count.keep, KeepSetting::Count(5));

        let within: Storage = toml::from_str("keep = \"2w\"").unwrap();
        assert_eq!(within.keep, KeepSetting::Within(TimeDelta::days(14)));
        assert_eq!(toml::to_string(&within).unwrap().trim(), "keep = \"14d\"");

        assert!(toml::from_str::<Storage>("keep = \"soon\"").is_err());
    }
}
