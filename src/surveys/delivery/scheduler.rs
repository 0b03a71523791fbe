use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::config::{DeliveryConfig, DeliverySchedule, ScheduleCadence, TriggerEvent};

/// Next instant a scheduled config must fire, or `None` for manual and
/// triggered configs.
///
/// The anchor is `last_sent` when the caller has one, otherwise the schedule's
/// `start_date`, otherwise `reference`. The result is the first cadence
/// occurrence strictly after the anchor and never before `start_date`.
pub fn next_due_instant(
    config: &DeliveryConfig,
    reference: NaiveDateTime,
    last_sent: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    let DeliveryConfig::Scheduled { schedule, .. } = config else {
        return None;
    };

    let mut floor = match last_sent {
        Some(sent) => sent + Duration::seconds(1),
        None => match schedule.start_date {
            Some(start) => start.and_time(NaiveTime::MIN),
            None => reference + Duration::seconds(1),
        },
    };
    if let Some(start) = schedule.start_date {
        let start_floor = start.and_time(NaiveTime::MIN);
        if floor < start_floor {
            floor = start_floor;
        }
    }

    first_occurrence_at_or_after(schedule, floor)
}

/// True when the next computed send instant has already arrived.
pub fn is_due(
    config: &DeliveryConfig,
    reference: NaiveDateTime,
    last_sent: Option<NaiveDateTime>,
) -> bool {
    next_due_instant(config, reference, last_sent).is_some_and(|due| due <= reference)
}

/// Decide whether a business event arms a delayed send. Unmatched event types
/// and configs without automatic sending are silently ignored.
pub fn on_event(
    config: &DeliveryConfig,
    event: TriggerEvent,
    event_at: NaiveDateTime,
) -> Option<NaiveDateTime> {
    match config {
        DeliveryConfig::Triggered { trigger, .. }
            if trigger.event == event && trigger.send_automatically =>
        {
            event_at.checked_add_signed(Duration::hours(i64::from(trigger.delay_hours)))
        }
        _ => None,
    }
}

fn first_occurrence_at_or_after(
    schedule: &DeliverySchedule,
    floor: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let time = schedule.time;
    match schedule.cadence {
        ScheduleCadence::Daily => {
            let today = floor.date().and_time(time);
            if today >= floor {
                Some(today)
            } else {
                floor.date().succ_opt().map(|next| next.and_time(time))
            }
        }
        ScheduleCadence::Weekly { day_of_week } => {
            let mut date = floor.date();
            for _ in 0..=7 {
                if date.weekday().num_days_from_sunday() == u32::from(day_of_week) {
                    let candidate = date.and_time(time);
                    if candidate >= floor {
                        return Some(candidate);
                    }
                }
                date = date.succ_opt()?;
            }
            None
        }
        ScheduleCadence::Monthly { day_of_month } => {
            let candidate = monthly_occurrence(floor.date(), day_of_month, time)?;
            if candidate >= floor {
                return Some(candidate);
            }
            let (year, month) = month_after(floor.date().year(), floor.date().month());
            let next_month = NaiveDate::from_ymd_opt(year, month, 1)?;
            monthly_occurrence(next_month, day_of_month, time)
        }
    }
}

/// Occurrence within `within`'s month, with the day clamped to the month's
/// length so a day-of-month of 31 lands on April 30 rather than skipping April.
fn monthly_occurrence(
    within: NaiveDate,
    day_of_month: u8,
    time: NaiveTime,
) -> Option<NaiveDateTime> {
    let day = u32::from(day_of_month).min(days_in_month(within.year(), within.month()));
    NaiveDate::from_ymd_opt(within.year(), within.month(), day).map(|date| date.and_time(time))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = month_after(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn month_after(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
