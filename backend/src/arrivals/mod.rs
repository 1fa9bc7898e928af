//! Case arrival generation
//!
//! Each case type has its own interarrival process. The generator keeps the
//! next arrival moment per type and always releases the earliest one, so
//! arrivals of all types come out merged in time order. Case ids are handed
//! out sequentially in arrival order.
//!
//! # Key Principles
//!
//! 1. **Determinism**: Same seed + same config → same arrivals
//! 2. **Per-type processes**: every case type samples its own gaps
//! 3. **Calendars**: business-hours processes skip nights and weekends
//!
//! # Example
//!
//! ```
//! use case_sim_core::arrivals::{ArrivalConfig, ArrivalGenerator, InterarrivalDistribution};
//! use case_sim_core::rng::RngManager;
//!
//! let mut rng = RngManager::new(42);
//! let configs = vec![ArrivalConfig {
//!     case_type: "EM".to_string(),
//!     distribution: InterarrivalDistribution::Exponential { rate: 1.0 },
//! }];
//! let mut arrivals = ArrivalGenerator::new(configs, None, &mut rng);
//!
//! let first = arrivals.next_arrival(&mut rng).unwrap();
//! let second = arrivals.next_arrival(&mut rng).unwrap();
//! assert!(second.time >= first.time);
//! assert_eq!(second.case_id.0, first.case_id.0 + 1);
//! ```

use crate::core::time::{day_of_week, hour_of_day, SimTime, HOURS_PER_DAY, HOURS_PER_WEEK};
use crate::models::element::CaseId;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Arrival process for one case type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalConfig {
    pub case_type: String,
    pub distribution: InterarrivalDistribution,
}

/// Distribution of the gap between consecutive arrivals of one case type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterarrivalDistribution {
    /// Poisson arrivals around the clock (mean gap `1 / rate`)
    Exponential { rate: f64 },

    /// Constant gap
    Fixed { interval: f64 },

    /// Uniform gap in `[0, max_gap)` that only lands on weekdays between
    /// `open_hour` and `close_hour`; gaps spilling past closing time move
    /// to the next opening, weekend arrivals move to Monday.
    BusinessHours {
        open_hour: f64,
        close_hour: f64,
        max_gap: f64,
    },
}

/// One generated arrival
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub case_id: CaseId,
    pub case_type: String,
    pub time: SimTime,
}

#[derive(Debug, Clone)]
struct Process {
    config: ArrivalConfig,
    next_time: SimTime,
}

/// Generator for case arrivals across all case types.
#[derive(Debug, Clone)]
pub struct ArrivalGenerator {
    processes: Vec<Process>,
    next_case_id: u64,
    /// Stop after this many arrivals (None = unbounded)
    limit: Option<u64>,
}

impl ArrivalGenerator {
    /// Create a generator and sample the first arrival of every process.
    pub fn new(configs: Vec<ArrivalConfig>, limit: Option<u64>, rng: &mut RngManager) -> Self {
        let processes = configs
            .into_iter()
            .map(|config| {
                let next_time = sample_gap(&config.distribution, 0.0, rng);
                Process { config, next_time }
            })
            .collect();
        Self {
            processes,
            next_case_id: 0,
            limit,
        }
    }

    /// Release the earliest pending arrival and sample that type's next one.
    ///
    /// Ties go to the process configured first.
    pub fn next_arrival(&mut self, rng: &mut RngManager) -> Option<Arrival> {
        if self.limit.map_or(false, |limit| self.next_case_id >= limit) {
            return None;
        }
        let process = self
            .processes
            .iter_mut()
            .reduce(|best, candidate| {
                if candidate.next_time < best.next_time {
                    candidate
                } else {
                    best
                }
            })?;

        let time = process.next_time;
        process.next_time = time + sample_gap(&process.config.distribution, time, rng);

        let case_id = CaseId(self.next_case_id);
        self.next_case_id += 1;
        Some(Arrival {
            case_id,
            case_type: process.config.case_type.clone(),
            time,
        })
    }

    /// Number of arrivals released so far
    pub fn released(&self) -> u64 {
        self.next_case_id
    }

    /// Rewind to the start, resampling first arrivals from `rng`.
    pub fn reset(&mut self, rng: &mut RngManager) {
        self.next_case_id = 0;
        for process in &mut self.processes {
            process.next_time = sample_gap(&process.config.distribution, 0.0, rng);
        }
    }
}

/// Gap from `current` to the next arrival of a process.
fn sample_gap(distribution: &InterarrivalDistribution, current: SimTime, rng: &mut RngManager) -> f64 {
    match distribution {
        InterarrivalDistribution::Exponential { rate } => rng.exponential(*rate),
        InterarrivalDistribution::Fixed { interval } => *interval,
        InterarrivalDistribution::BusinessHours {
            open_hour,
            close_hour,
            max_gap,
        } => {
            let offset = current.rem_euclid(HOURS_PER_WEEK);
            let mut t = offset + rng.uniform(0.0, *max_gap);
            if hour_of_day(t) > *close_hour {
                t += HOURS_PER_DAY - *close_hour;
            }
            if hour_of_day(t) < *open_hour {
                t += *open_hour;
            }
            if day_of_week(t) >= 5 {
                t += 2.0 * HOURS_PER_DAY;
            }
            t - offset
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn business(case_type: &str) -> ArrivalConfig {
        ArrivalConfig {
            case_type: case_type.to_string(),
            distribution: InterarrivalDistribution::BusinessHours {
                open_hour: 9.0,
                close_hour: 17.0,
                max_gap: 1.0,
            },
        }
    }

    #[test]
    fn test_business_hours_arrivals_stay_in_window() {
        let mut rng = RngManager::new(11);
        let mut arrivals = ArrivalGenerator::new(vec![business("A")], None, &mut rng);

        for _ in 0..500 {
            let arrival = arrivals.next_arrival(&mut rng).unwrap();
            let hour = hour_of_day(arrival.time);
            assert!(day_of_week(arrival.time) < 5, "weekend arrival at {}", arrival.time);
            assert!(
                (9.0..=17.0).contains(&hour),
                "arrival at hour {} ({})",
                hour,
                arrival.time
            );
        }
    }

    #[test]
    fn test_merged_processes_are_time_ordered() {
        let mut rng = RngManager::new(5);
        let configs = vec![
            business("A"),
            business("B"),
            ArrivalConfig {
                case_type: "EM".to_string(),
                distribution: InterarrivalDistribution::Exponential { rate: 1.0 },
            },
        ];
        let mut arrivals = ArrivalGenerator::new(configs, None, &mut rng);

        let mut last = 0.0;
        for expected_id in 0..300 {
            let arrival = arrivals.next_arrival(&mut rng).unwrap();
            assert!(arrival.time >= last);
            assert_eq!(arrival.case_id, CaseId(expected_id));
            last = arrival.time;
        }
    }

    #[test]
    fn test_limit_stops_generation() {
        let mut rng = RngManager::new(1);
        let configs = vec![ArrivalConfig {
            case_type: "X".to_string(),
            distribution: InterarrivalDistribution::Fixed { interval: 2.0 },
        }];
        let mut arrivals = ArrivalGenerator::new(configs, Some(2), &mut rng);

        assert_eq!(arrivals.next_arrival(&mut rng).unwrap().time, 2.0);
        assert_eq!(arrivals.next_arrival(&mut rng).unwrap().time, 4.0);
        assert!(arrivals.next_arrival(&mut rng).is_none());
        assert_eq!(arrivals.released(), 2);
    }

    #[test]
    fn test_no_processes_means_no_arrivals() {
        let mut rng = RngManager::new(1);
        let mut arrivals = ArrivalGenerator::new(Vec::new(), None, &mut rng);
        assert!(arrivals.next_arrival(&mut rng).is_none());
    }
}
