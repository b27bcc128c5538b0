//! Vacancy post-processing

use tracing::info;

use crate::domain::{CalendarContext, ScheduleTable, VacancyPeriod, VacancyTreatment};

/// Substitute away values over every timestep whose date falls in `period`.
///
/// Series marked [`VacancyTreatment::Unaffected`] are left as generated.
/// Returns the number of vacant timesteps.
pub fn apply_vacancy(table: &mut ScheduleTable, period: Option<&VacancyPeriod>, ctx: &CalendarContext) -> usize {
    let Some(period) = period else {
        return 0;
    };

    let steps_per_day = ctx.steps_per_day();
    let vacant_days: Vec<usize> = (0..ctx.days_in_year())
        .filter(|day| period.contains(ctx.date_of_day(*day)))
        .collect();

    for series in table.series_mut() {
        if let VacancyTreatment::Substitute(away) = series.vacancy {
            for day in &vacant_days {
                let start = day * steps_per_day;
                series.values[start..start + steps_per_day].fill(away);
            }
        }
    }

    let vacant_steps = vacant_days.len() * steps_per_day;
    info!(period = %period, days = vacant_days.len(), steps = vacant_steps, "applied vacancy period");
    vacant_steps
}
