use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScheduleError;

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// A month/day pair independent of year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMonthDay")]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

#[derive(Deserialize)]
struct RawMonthDay {
    month: u32,
    day: u32,
}

impl TryFrom<RawMonthDay> for MonthDay {
    type Error = ScheduleError;

    fn try_from(raw: RawMonthDay) -> Result<Self, Self::Error> {
        MonthDay::new(raw.month, raw.day).ok_or_else(|| ScheduleError::InvalidVacancyPeriod {
            input: format!("{}/{}", raw.month, raw.day),
            reason: "day out of range for month".to_string(),
        })
    }
}

impl MonthDay {
    /// Validated constructor; February 29 is accepted
    pub fn new(month: u32, day: u32) -> Option<Self> {
        // 2000 is a leap year, so Feb 29 validates
        NaiveDate::from_ymd_opt(2000, month, day).map(|_| Self { month, day })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = MONTH_NAMES[(self.month - 1) as usize];
        let mut abbr = name[..3].to_string();
        abbr[..1].make_ascii_uppercase();
        write!(f, "{} {}", abbr, self.day)
    }
}

fn parse_month(token: &str) -> Option<u32> {
    let token = token.to_ascii_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| token == *name || (token.len() == 3 && name.starts_with(&token)))
        .map(|i| i as u32 + 1)
}

/// Inclusive month/day window during which the dwelling is unoccupied.
///
/// `begin` may fall after `end`, in which case the window wraps across the
/// year boundary ("Dec 15 - Jan 15").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VacancyPeriod {
    pub begin: MonthDay,
    pub end: MonthDay,
}

impl VacancyPeriod {
    pub fn new(begin: MonthDay, end: MonthDay) -> Self {
        Self { begin, end }
    }

    pub fn wraps_year(&self) -> bool {
        self.begin > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = MonthDay::of(date);
        if self.wraps_year() {
            md >= self.begin || md <= self.end
        } else {
            md >= self.begin && md <= self.end
        }
    }
}

impl FromStr for VacancyPeriod {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ScheduleError::InvalidVacancyPeriod {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (begin, end) = s
            .split_once('-')
            .ok_or_else(|| invalid("expected \"<Month> <Day> - <Month> <Day>\""))?;

        let parse_side = |side: &str| -> Result<MonthDay, ScheduleError> {
            let mut tokens = side.split_whitespace();
            let (Some(month), Some(day), None) = (tokens.next(), tokens.next(), tokens.next())
            else {
                return Err(invalid("each side must be \"<Month> <Day>\""));
            };
            let month = parse_month(month).ok_or_else(|| invalid("unknown month name"))?;
            let day: u32 = day.parse().map_err(|_| invalid("day is not a number"))?;
            MonthDay::new(month, day).ok_or_else(|| invalid("day out of range for month"))
        };

        Ok(Self::new(parse_side(begin)?, parse_side(end)?))
    }
}

impl TryFrom<String> for VacancyPeriod {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VacancyPeriod> for String {
    fn from(period: VacancyPeriod) -> Self {
        period.to_string()
    }
}

impl fmt::Display for VacancyPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.begin, self.end)
    }
}
