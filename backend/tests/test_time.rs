//! Tests for simulation time and calendars
//!
//! Time is measured in hours from Monday 00:00 of week 0.

use case_sim_core::core::time::{
    day_of_week, hour_of_day, is_planning_slot, is_weekday, is_working_time, next_planning_slot,
    HOURS_PER_DAY, HOURS_PER_WEEK,
};

#[test]
fn test_week_starts_on_monday() {
    assert_eq!(day_of_week(0.0), 0);
    assert_eq!(day_of_week(23.99), 0);
    assert_eq!(day_of_week(24.0), 1);
    assert_eq!(day_of_week(HOURS_PER_WEEK - 0.01), 6);
    assert_eq!(day_of_week(HOURS_PER_WEEK), 0);
}

#[test]
fn test_hour_of_day_across_days() {
    assert_eq!(hour_of_day(0.0), 0.0);
    assert_eq!(hour_of_day(HOURS_PER_DAY + 13.5), 13.5);
    assert_eq!(hour_of_day(3.0 * HOURS_PER_WEEK + 2.0), 2.0);
}

#[test]
fn test_weekend_is_not_weekday() {
    // Saturday and Sunday of week 2
    let saturday = 2.0 * HOURS_PER_WEEK + 5.0 * HOURS_PER_DAY + 12.0;
    let sunday = saturday + HOURS_PER_DAY;
    assert!(!is_weekday(saturday));
    assert!(!is_weekday(sunday));
    assert!(is_weekday(sunday + HOURS_PER_DAY));
}

#[test]
fn test_working_time_bounds() {
    let tuesday = HOURS_PER_DAY;
    assert!(!is_working_time(tuesday + 7.99));
    assert!(is_working_time(tuesday + 8.0));
    assert!(is_working_time(tuesday + 12.0));
    assert!(is_working_time(tuesday + 17.0));
    assert!(!is_working_time(tuesday + 17.01));
}

#[test]
fn test_planning_slots_are_half_hours() {
    let wednesday = 2.0 * HOURS_PER_DAY;
    assert!(is_planning_slot(wednesday + 8.0));
    assert!(is_planning_slot(wednesday + 8.5));
    assert!(is_planning_slot(wednesday + 15.0));
    assert!(!is_planning_slot(wednesday + 15.5));
    assert!(!is_planning_slot(wednesday + 8.25));
    assert!(!is_planning_slot(wednesday + 7.5));
}

#[test]
fn test_planning_slot_tolerates_float_noise() {
    // 0.1 + 0.2 style error must not hide a slot
    let noisy = 24.0 + 8.0 + 1e-9;
    assert!(is_planning_slot(noisy));
}

#[test]
fn test_no_planning_slots_on_weekend() {
    let saturday = 5.0 * HOURS_PER_DAY;
    assert!(!is_planning_slot(saturday + 8.0));
    assert!(!is_planning_slot(f64::NAN));
}

#[test]
fn test_next_planning_slot() {
    // Exactly on a slot returns itself
    assert_eq!(next_planning_slot(8.5), Some(8.5));
    // Between slots rounds up
    assert_eq!(next_planning_slot(8.6), Some(9.0));
    // After the last slot of Tuesday -> Wednesday 08:00
    assert_eq!(next_planning_slot(HOURS_PER_DAY + 15.1), Some(2.0 * HOURS_PER_DAY + 8.0));
    // Saturday -> Monday of the following week
    assert_eq!(
        next_planning_slot(5.0 * HOURS_PER_DAY + 10.0),
        Some(HOURS_PER_WEEK + 8.0)
    );
    assert_eq!(next_planning_slot(f64::INFINITY), None);
}
