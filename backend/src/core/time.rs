//! Simulation time and the working-week calendar
//!
//! Time is continuous and measured in hours. `t = 0.0` is Monday 00:00, so
//! day-of-week and hour-of-day are plain modular arithmetic on the moment.
//! Calendar helpers here are shared by the reference problem (staffing
//! windows, release batching) and the slot planner.

/// A moment on the simulation clock, in hours since Monday 00:00.
pub type SimTime = f64;

pub const HOURS_PER_DAY: f64 = 24.0;
pub const HOURS_PER_WEEK: f64 = 168.0;

/// First and last hour of a working day (inclusive on both ends).
pub const WORKDAY_START_HOUR: f64 = 8.0;
pub const WORKDAY_END_HOUR: f64 = 17.0;

/// Planning slots are half-hour marks from 08:00 to 15:00 on weekdays.
pub const PLANNING_SLOT_FIRST_HOUR: f64 = 8.0;
pub const PLANNING_SLOT_LAST_HOUR: f64 = 15.0;
const SLOTS_PER_HOUR: f64 = 2.0;

/// Day of the week for a moment, 0 = Monday .. 6 = Sunday.
///
/// # Example
/// ```
/// use case_sim_core::core::time::day_of_week;
///
/// assert_eq!(day_of_week(0.0), 0);
/// assert_eq!(day_of_week(24.0 * 5.0 + 3.0), 5);
/// assert_eq!(day_of_week(24.0 * 7.0), 0);
/// ```
pub fn day_of_week(time: SimTime) -> u32 {
    ((time.rem_euclid(HOURS_PER_WEEK)) / HOURS_PER_DAY).floor() as u32
}

/// Hour within the day, in `[0, 24)`.
///
/// # Example
/// ```
/// use case_sim_core::core::time::hour_of_day;
///
/// assert_eq!(hour_of_day(30.5), 6.5);
/// ```
pub fn hour_of_day(time: SimTime) -> f64 {
    time.rem_euclid(HOURS_PER_DAY)
}

/// Monday through Friday.
pub fn is_weekday(time: SimTime) -> bool {
    day_of_week(time) < 5
}

/// Weekdays between 08:00 and 17:00, both ends included.
///
/// # Example
/// ```
/// use case_sim_core::core::time::is_working_time;
///
/// assert!(is_working_time(8.0));           // Monday 08:00
/// assert!(is_working_time(17.0));          // Monday 17:00
/// assert!(!is_working_time(17.5));
/// assert!(!is_working_time(24.0 * 5.0 + 10.0)); // Saturday
/// ```
pub fn is_working_time(time: SimTime) -> bool {
    let hour = hour_of_day(time);
    is_weekday(time) && (WORKDAY_START_HOUR..=WORKDAY_END_HOUR).contains(&hour)
}

/// Whether `time` falls exactly on a weekday planning slot.
///
/// Slots are compared at a tenth-of-an-hour resolution so that moments
/// produced by floating-point arithmetic (e.g. `now + 24.0`) still match.
pub fn is_planning_slot(time: SimTime) -> bool {
    if !time.is_finite() || !is_weekday(time) {
        return false;
    }
    let tenths = (hour_of_day(time) * 10.0).round() as i64;
    let first = (PLANNING_SLOT_FIRST_HOUR * 10.0) as i64;
    let last = (PLANNING_SLOT_LAST_HOUR * 10.0) as i64;
    (first..=last).contains(&tenths) && tenths % 5 == 0
}

/// The earliest planning slot at or after `time`.
///
/// Returns `None` only for non-finite input; every week contains slots.
///
/// # Example
/// ```
/// use case_sim_core::core::time::next_planning_slot;
///
/// // Monday 07:10 -> Monday 08:00
/// assert_eq!(next_planning_slot(7.2), Some(8.0));
/// // Friday 15:10 -> Monday 08:00 of the next week
/// assert_eq!(next_planning_slot(24.0 * 4.0 + 15.2), Some(168.0 + 8.0));
/// ```
pub fn next_planning_slot(time: SimTime) -> Option<SimTime> {
    if !time.is_finite() {
        return None;
    }
    let first_half_hour = (time * SLOTS_PER_HOUR).ceil() as i64;
    let slots_per_week = (HOURS_PER_WEEK * SLOTS_PER_HOUR) as i64;
    (first_half_hour..=first_half_hour + slots_per_week)
        .map(|half_hours| half_hours as f64 / SLOTS_PER_HOUR)
        .find(|&candidate| is_planning_slot(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_wraps_weekly() {
        assert_eq!(day_of_week(0.0), 0);
        assert_eq!(day_of_week(23.99), 0);
        assert_eq!(day_of_week(24.0), 1);
        assert_eq!(day_of_week(167.0), 6);
        assert_eq!(day_of_week(168.0 + 48.0), 2);
    }

    #[test]
    fn test_working_time_excludes_weekend() {
        let saturday_noon = 5.0 * HOURS_PER_DAY + 12.0;
        let sunday_noon = 6.0 * HOURS_PER_DAY + 12.0;
        assert!(!is_working_time(saturday_noon));
        assert!(!is_working_time(sunday_noon));
        assert!(is_working_time(4.0 * HOURS_PER_DAY + 12.0));
    }

    #[test]
    fn test_planning_slots_on_half_hours() {
        assert!(is_planning_slot(8.0));
        assert!(is_planning_slot(8.5));
        assert!(is_planning_slot(15.0));
        assert!(!is_planning_slot(15.5));
        assert!(!is_planning_slot(7.5));
        assert!(!is_planning_slot(8.25));
        assert!(!is_planning_slot(5.0 * HOURS_PER_DAY + 9.0));
    }

    #[test]
    fn test_next_planning_slot_is_identity_on_slots() {
        assert_eq!(next_planning_slot(9.5), Some(9.5));
        assert_eq!(next_planning_slot(9.6), Some(10.0));
        assert_eq!(next_planning_slot(f64::NAN), None);
    }
}
