//! Regional peak hours and daily peak windows

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;
use tracing::warn;

use crate::domain::{StateCode, US_STATE_CODES};

/// Season of a calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Season {
    /// June through September
    Summer,
    /// December through March
    Winter,
    Shoulder,
}

impl Season {
    pub fn of_month(month: u32) -> Self {
        match month {
            6..=9 => Season::Summer,
            12 | 1..=3 => Season::Winter,
            _ => Season::Shoulder,
        }
    }

    /// Summer only modifies cooling and winter only heating
    pub fn applies_to(self, kind: SetpointKind) -> bool {
        !matches!(
            (self, kind),
            (Season::Summer, SetpointKind::Heating) | (Season::Winter, SetpointKind::Cooling)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SetpointKind {
    Heating,
    Cooling,
}

/// Which regional peak hour anchors the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OffsetType {
    /// Curtail load at the peak
    #[default]
    Shed,
    /// Move load ahead of the peak
    Shift,
}

/// Peak start hours (0-23) for one season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakHours {
    pub shed: u8,
    pub shift: u8,
}

impl PeakHours {
    pub const fn new(shed: u8, shift: u8) -> Self {
        Self { shed, shift }
    }

    pub fn hour(&self, offset_type: OffsetType) -> u8 {
        match offset_type {
            OffsetType::Shed => self.shed,
            OffsetType::Shift => self.shift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalPeakHours {
    pub summer: PeakHours,
    pub winter: PeakHours,
}

impl SeasonalPeakHours {
    pub const fn new(summer: PeakHours, winter: PeakHours) -> Self {
        Self { summer, winter }
    }

    /// Heating follows the winter peak and cooling the summer peak, in every season
    pub fn for_kind(&self, kind: SetpointKind) -> PeakHours {
        match kind {
            SetpointKind::Heating => self.winter,
            SetpointKind::Cooling => self.summer,
        }
    }
}

// Evening peaks in the mountain west and the north
const MOUNTAIN: SeasonalPeakHours = SeasonalPeakHours::new(PeakHours::new(17, 16), PeakHours::new(18, 17));
const NORTHERN: SeasonalPeakHours = SeasonalPeakHours::new(PeakHours::new(17, 16), PeakHours::new(17, 16));
const PACIFIC: SeasonalPeakHours = SeasonalPeakHours::new(PeakHours::new(18, 17), PeakHours::new(18, 17));
// Cooling-dominated south: afternoon summer peak, morning winter peak
const SOUTHERN: SeasonalPeakHours = SeasonalPeakHours::new(PeakHours::new(16, 15), PeakHours::new(7, 6));

fn region_of(code: &str) -> SeasonalPeakHours {
    match code {
        "AZ" | "CO" | "ID" | "MT" | "NM" | "NV" | "UT" | "WY" => MOUNTAIN,
        "AK" | "CA" | "HI" | "OR" | "WA" => PACIFIC,
        "AL" | "AR" | "FL" | "GA" | "LA" | "MS" | "OK" | "SC" | "TX" => SOUTHERN,
        _ => NORTHERN,
    }
}

static BUILTIN: Lazy<PeakHourTable> = Lazy::new(|| {
    let rows = US_STATE_CODES
        .iter()
        .filter_map(|code| code.parse::<StateCode>().ok())
        .map(|code| {
            let hours = region_of(code.as_str());
            (code, hours)
        })
        .collect();
    PeakHourTable {
        reference: MOUNTAIN,
        rows,
    }
});

/// Per-state seasonal peak hours with a reference row for unknown states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakHourTable {
    reference: SeasonalPeakHours,
    #[serde(default)]
    rows: BTreeMap<StateCode, SeasonalPeakHours>,
}

impl PeakHourTable {
    pub fn new(reference: SeasonalPeakHours) -> Self {
        Self {
            reference,
            rows: BTreeMap::new(),
        }
    }

    /// Regional hours for every supported state
    pub fn builtin() -> &'static PeakHourTable {
        &BUILTIN
    }

    pub fn with_state(mut self, state: StateCode, hours: SeasonalPeakHours) -> Self {
        self.rows.insert(state, hours);
        self
    }

    pub fn lookup(&self, state: &StateCode) -> SeasonalPeakHours {
        match self.rows.get(state) {
            Some(hours) => *hours,
            None => {
                warn!(state = %state, "no peak hours for state, using reference hours");
                self.reference
            }
        }
    }
}

/// Position of a timestep relative to the day's windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakPhase {
    Normal,
    PrePeak,
    Peak,
}

/// Step offsets within one day; `pre_peak_start <= peak_start <= peak_end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyPeakIndices {
    pub pre_peak_start: usize,
    pub peak_start: usize,
    pub peak_end: usize,
    /// A window edge fell outside the day and was clamped to it
    pub clamped: bool,
}

impl DailyPeakIndices {
    pub fn compute(
        hour: u8,
        steps_per_hour: usize,
        steps_per_day: usize,
        peak_duration_steps: usize,
        pre_peak_duration_steps: usize,
        shift_steps: i64,
    ) -> Self {
        let day_end = steps_per_day as i64;
        let peak_start = (hour as i64 * steps_per_hour as i64).saturating_add(shift_steps);
        let peak_end = peak_start.saturating_add(peak_duration_steps as i64);
        let pre_peak_start = peak_start.saturating_sub(pre_peak_duration_steps as i64);

        let bound = |i: i64| i.clamp(0, day_end);
        let clamped = [pre_peak_start, peak_start, peak_end]
            .iter()
            .any(|i| bound(*i) != *i);

        Self {
            pre_peak_start: bound(pre_peak_start) as usize,
            peak_start: bound(peak_start) as usize,
            peak_end: bound(peak_end) as usize,
            clamped,
        }
    }

    pub fn phase(&self, index_in_day: usize) -> PeakPhase {
        if (self.peak_start..self.peak_end).contains(&index_in_day) {
            PeakPhase::Peak
        } else if (self.pre_peak_start..self.peak_start).contains(&index_in_day) {
            PeakPhase::PrePeak
        } else {
            PeakPhase::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, Season::Winter)]
    #[case(3, Season::Winter)]
    #[case(4, Season::Shoulder)]
    #[case(6, Season::Summer)]
    #[case(9, Season::Summer)]
    #[case(11, Season::Shoulder)]
    #[case(12, Season::Winter)]
    fn test_season_of_month(#[case] month: u32, #[case] season: Season) {
        assert_eq!(Season::of_month(month), season);
    }

    #[test]
    fn test_season_applicability() {
        assert!(!Season::Summer.applies_to(SetpointKind::Heating));
        assert!(Season::Summer.applies_to(SetpointKind::Cooling));
        assert!(Season::Winter.applies_to(SetpointKind::Heating));
        assert!(!Season::Winter.applies_to(SetpointKind::Cooling));
        assert!(Season::Shoulder.applies_to(SetpointKind::Heating));
        assert!(Season::Shoulder.applies_to(SetpointKind::Cooling));
    }

    #[test]
    fn test_builtin_covers_every_state() {
        let table = PeakHourTable::builtin();
        assert_eq!(table.rows.len(), US_STATE_CODES.len());
        let co = table.lookup(&"CO".parse().unwrap());
        assert_eq!(co.winter.hour(OffsetType::Shed), 18);
        assert_eq!(co.summer.hour(OffsetType::Shift), 16);
    }

    #[test]
    fn test_unknown_state_uses_reference() {
        let table = PeakHourTable::new(MOUNTAIN).with_state("TX".parse().unwrap(), SOUTHERN);
        assert_eq!(table.lookup(&"TX".parse().unwrap()), SOUTHERN);
        assert_eq!(table.lookup(&"NY".parse().unwrap()), MOUNTAIN);
    }

    #[test]
    fn test_window_indices() {
        let idx = DailyPeakIndices::compute(18, 4, 96, 16, 16, 0);
        assert_eq!((idx.pre_peak_start, idx.peak_start, idx.peak_end), (56, 72, 88));
        assert!(!idx.clamped);
        assert_eq!(idx.phase(55), PeakPhase::Normal);
        assert_eq!(idx.phase(56), PeakPhase::PrePeak);
        assert_eq!(idx.phase(71), PeakPhase::PrePeak);
        assert_eq!(idx.phase(72), PeakPhase::Peak);
        assert_eq!(idx.phase(87), PeakPhase::Peak);
        assert_eq!(idx.phase(88), PeakPhase::Normal);
    }

    #[rstest]
    #[case(22, 0, (72, 88, 96))]
    #[case(2, -4, (0, 4, 20))]
    #[case(23, 8, (84, 96, 96))]
    #[case(18, i64::MAX, (96, 96, 96))]
    #[case(18, i64::MIN, (0, 0, 0))]
    fn test_windows_clamp_to_the_day(
        #[case] hour: u8,
        #[case] shift: i64,
        #[case] expected: (usize, usize, usize),
    ) {
        let idx = DailyPeakIndices::compute(hour, 4, 96, 16, 16, shift);
        assert!(idx.clamped);
        assert_eq!((idx.pre_peak_start, idx.peak_start, idx.peak_end), expected);
    }
}
