//! Reference hospital problem
//!
//! Three patient flows share one hospital:
//!
//! - **A / B** (referred patients): a referral arrives on a weekday between
//!   09:00 and 17:00. The intake moment is then *plannable*; the planner
//!   must schedule `time_for_intake` at least 24 h ahead. If the patient is
//!   not taken in within a week, they leave. At the intake moment the
//!   patient only proceeds if an intake desk is free and fewer than two
//!   patients are waiting after intake; otherwise they are sent home and
//!   the intake must be planned again.
//! - **EM** (emergency patients): arrive around the clock, get ER
//!   treatment, then either go home or continue like a referred patient.
//!   EM tasks take precedence in resource assignment.
//!
//! After intake (or ER treatment) a patient gets surgery and/or nursing
//! depending on the diagnosis. Nursing may end with a complication, which
//! sends the patient back to nursing or surgery. Patients are released in
//! batches at 08:00, 13:00 and 18:00.
//!
//! # Calendars
//!
//! Intake desks are staffed on weekdays 08:00-17:00. Outside those hours
//! only operating room `OR1` is open. Beds and ER staff never close.
//!
//! # Scoring
//!
//! Three penalties, each normalized by the number of cases started:
//! waiting more than 4 h between ER treatment and surgery/nursing (squared
//! excess), patients sent home at an intake moment, and cases not released
//! by the end of the run.

use crate::arrivals::{ArrivalConfig, ArrivalGenerator, InterarrivalDistribution};
use crate::core::time::{is_working_time, SimTime};
use crate::models::element::{CaseId, DataBag, Element, ElementId, IdSequence};
use crate::models::resource::{numbered, Resource, ResourceId};
use crate::problem::{
    materialize_planned_event, Evaluation, PlanContext, PlannableSet, PlanningError, Problem,
    ProblemError, RunSummary, TransitionContext,
};
use crate::rng::RngManager;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element labels of the hospital process
pub mod labels {
    pub const PATIENT_REFERRAL: &str = "patient_referral";
    pub const EMERGENCY_PATIENT: &str = "emergency_patient";
    pub const TIME_FOR_INTAKE: &str = "time_for_intake";
    pub const PATIENT_LEFT: &str = "patient_left_due_to_long_wait";
    pub const INTAKE: &str = "intake";
    pub const SURGERY: &str = "surgery";
    pub const NURSING: &str = "nursing";
    pub const ER_TREATMENT: &str = "ER_treatment";
    pub const RELEASING: &str = "releasing";
}

/// Resource types of the hospital
pub mod resource_types {
    pub const OR: &str = "OR";
    pub const A_BED: &str = "A_BED";
    pub const B_BED: &str = "B_BED";
    pub const INTAKE: &str = "INTAKE";
    pub const ER_PRACTITIONER: &str = "ER_PRACTITIONER";
}

pub const EMERGENCY_CASE_TYPE: &str = "EM";
pub const DIAGNOSIS_KEY: &str = "diagnosis";

/// The operating room kept open outside working time
const ALWAYS_OPEN_OR: &str = "OR1";

const DIAGNOSIS_WEIGHTS: [f64; 4] = [50.0, 25.0, 12.5, 12.5];
const A_DIAGNOSES: [&str; 4] = ["A1", "A2", "A3", "A4"];
const B_DIAGNOSES: [&str; 4] = ["B1", "B2", "B3", "B4"];

/// Batch release hours within the release cycle
const RELEASE_HOURS: [f64; 3] = [8.0, 13.0, 18.0];
const RELEASE_CYCLE_HOURS: f64 = 72.0;

/// Score weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    /// Hours between ER treatment and further care before the penalty starts
    pub er_wait_threshold: f64,
    pub er_treatment: f64,
    pub sent_home: f64,
    pub unprocessed: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            er_wait_threshold: 4.0,
            er_treatment: 20.0,
            sent_home: 500.0,
            unprocessed: 5000.0,
        }
    }
}

/// Configuration of the hospital problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthcareConfig {
    pub seed: u64,
    pub operating_rooms: usize,
    pub a_beds: usize,
    pub b_beds: usize,
    pub intake_staff: usize,
    pub er_practitioners: usize,
    /// One process per case type
    pub arrivals: Vec<ArrivalConfig>,
    /// Stop generating cases after this many (None = unbounded)
    pub max_cases: Option<u64>,
    /// Minimum hours between planning and the planned intake moment
    pub intake_lead_time: f64,
    /// Hours a referred patient waits before leaving
    pub patience: f64,
    /// Intake is refused while this many patients wait after intake
    pub max_waiting_after_intake: usize,
    pub first_planning_moment: f64,
    pub planning_interval: f64,
    pub penalties: PenaltyWeights,
}

impl Default for HealthcareConfig {
    fn default() -> Self {
        let business_hours = InterarrivalDistribution::BusinessHours {
            open_hour: 9.0,
            close_hour: 17.0,
            max_gap: 1.0,
        };
        Self {
            seed: 42,
            operating_rooms: 5,
            a_beds: 30,
            b_beds: 40,
            intake_staff: 4,
            er_practitioners: 9,
            arrivals: vec![
                ArrivalConfig {
                    case_type: "A".to_string(),
                    distribution: business_hours.clone(),
                },
                ArrivalConfig {
                    case_type: "B".to_string(),
                    distribution: business_hours,
                },
                ArrivalConfig {
                    case_type: EMERGENCY_CASE_TYPE.to_string(),
                    distribution: InterarrivalDistribution::Exponential { rate: 1.0 },
                },
            ],
            max_cases: None,
            intake_lead_time: 24.0,
            patience: 7.0 * 24.0,
            max_waiting_after_intake: 2,
            first_planning_moment: 18.0,
            planning_interval: 24.0,
            penalties: PenaltyWeights::default(),
        }
    }
}

impl HealthcareConfig {
    pub fn validate(&self) -> Result<(), ProblemError> {
        let invalid = |msg: &str| -> Result<(), ProblemError> {
            Err(ProblemError::InvalidConfig(msg.to_string()))
        };

        if self.operating_rooms == 0 {
            return invalid("operating_rooms must be positive");
        }
        if self.planning_interval <= 0.0 || !self.planning_interval.is_finite() {
            return invalid("planning_interval must be positive");
        }
        if self.first_planning_moment <= 0.0 || !self.first_planning_moment.is_finite() {
            return invalid("first_planning_moment must be positive");
        }
        if self.intake_lead_time < 0.0 || self.patience <= 0.0 {
            return invalid("intake_lead_time must be >= 0 and patience positive");
        }
        for arrival in &self.arrivals {
            if !matches!(arrival.case_type.as_str(), "A" | "B" | EMERGENCY_CASE_TYPE) {
                return Err(ProblemError::InvalidConfig(format!(
                    "unknown case type '{}'",
                    arrival.case_type
                )));
            }
            let valid = match arrival.distribution {
                InterarrivalDistribution::Exponential { rate } => rate > 0.0 && rate.is_finite(),
                InterarrivalDistribution::Fixed { interval } => interval > 0.0,
                InterarrivalDistribution::BusinessHours {
                    open_hour,
                    close_hour,
                    max_gap,
                } => 0.0 <= open_hour && open_hour < close_hour && close_hour < 24.0 && max_gap > 0.0,
            };
            if !valid {
                return Err(ProblemError::InvalidConfig(format!(
                    "invalid arrival process for case type '{}'",
                    arrival.case_type
                )));
            }
        }
        Ok(())
    }
}

/// The hospital process
pub struct HealthcareProblem {
    config: HealthcareConfig,
    rng: RngManager,
    resources: Vec<Resource>,
    arrivals: ArrivalGenerator,
    ids: IdSequence,
    plannable: PlannableSet,
    /// Cases done with intake whose surgery/nursing has not started
    patients_after_intake: Vec<CaseId>,
    er_treatment_finished: BTreeMap<CaseId, SimTime>,
    er_followup_started: BTreeMap<CaseId, SimTime>,
}

impl HealthcareProblem {
    pub fn new(config: HealthcareConfig) -> Result<Self, ProblemError> {
        config.validate()?;

        let mut rng = RngManager::new(config.seed);
        let arrivals = ArrivalGenerator::new(config.arrivals.clone(), config.max_cases, &mut rng);
        let resources = [
            numbered("OR", resource_types::OR, config.operating_rooms),
            numbered("A_BED", resource_types::A_BED, config.a_beds),
            numbered("B_BED", resource_types::B_BED, config.b_beds),
            numbered("INTAKE", resource_types::INTAKE, config.intake_staff),
            numbered(
                "ER_PRACTITIONER",
                resource_types::ER_PRACTITIONER,
                config.er_practitioners,
            ),
        ]
        .concat();

        Ok(Self {
            config,
            rng,
            resources,
            arrivals,
            ids: IdSequence::new(),
            plannable: PlannableSet::new(),
            patients_after_intake: Vec::new(),
            er_treatment_finished: BTreeMap::new(),
            er_followup_started: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &HealthcareConfig {
        &self.config
    }

    pub fn patients_after_intake(&self) -> &[CaseId] {
        &self.patients_after_intake
    }

    /// Whether resources of this type work at `time` at all
    pub fn resource_type_available(resource_type: &str, time: SimTime) -> bool {
        match resource_type {
            resource_types::INTAKE => is_working_time(time),
            _ => true,
        }
    }

    /// Next batch release moment at or after `time`.
    ///
    /// # Example
    /// ```
    /// use case_sim_core::problem::HealthcareProblem;
    ///
    /// assert_eq!(HealthcareProblem::next_release_time(9.0), 13.0);
    /// assert_eq!(HealthcareProblem::next_release_time(13.0), 13.0);
    /// assert_eq!(HealthcareProblem::next_release_time(20.0), 80.0);
    /// ```
    pub fn next_release_time(time: SimTime) -> SimTime {
        let in_cycle = time.rem_euclid(RELEASE_CYCLE_HOURS);
        let last_release = RELEASE_HOURS[RELEASE_HOURS.len() - 1];
        if in_cycle <= last_release {
            let offset = RELEASE_HOURS
                .iter()
                .map(|hour| hour - in_cycle)
                .filter(|offset| *offset >= 0.0)
                .fold(f64::INFINITY, f64::min);
            time + offset
        } else {
            time + (RELEASE_CYCLE_HOURS - in_cycle) + RELEASE_HOURS[0]
        }
    }

    fn diagnosis(case_id: CaseId, case_data: &DataBag) -> Result<Option<String>, ProblemError> {
        match case_data.get(DIAGNOSIS_KEY) {
            Some(serde_json::Value::String(diagnosis)) => Ok(Some(diagnosis.clone())),
            Some(serde_json::Value::Null) => Ok(None),
            _ => Err(ProblemError::MissingCaseData {
                case_id,
                key: DIAGNOSIS_KEY.to_string(),
            }),
        }
    }

    fn required_diagnosis(case_id: CaseId, case_data: &DataBag) -> Result<String, ProblemError> {
        Self::diagnosis(case_id, case_data)?.ok_or_else(|| ProblemError::MissingCaseData {
            case_id,
            key: DIAGNOSIS_KEY.to_string(),
        })
    }

    fn case_data<'a>(
        ctx: &'a TransitionContext<'_>,
        case_id: CaseId,
    ) -> Result<&'a DataBag, ProblemError> {
        ctx.cases()
            .case_data(case_id)
            .ok_or_else(|| ProblemError::Other(format!("{case_id} has no case data")))
    }

    fn needs_surgery(diagnosis: &str) -> Result<bool, ProblemError> {
        match diagnosis {
            "A2" | "A3" | "A4" | "B3" | "B4" => Ok(true),
            "A1" | "B1" | "B2" => Ok(false),
            other => Err(ProblemError::Other(format!("unknown diagnosis '{other}'"))),
        }
    }

    fn surgery_duration(diagnosis: &str) -> Option<(f64, f64)> {
        match diagnosis {
            "A2" => Some((1.0, 0.25)),
            "A3" => Some((2.0, 0.5)),
            "A4" | "B3" => Some((4.0, 0.5)),
            "B4" => Some((4.0, 1.0)),
            _ => None,
        }
    }

    fn nursing_duration(diagnosis: &str) -> Option<(f64, f64)> {
        match diagnosis {
            "A1" => Some((4.0, 0.5)),
            "A2" | "B1" => Some((8.0, 2.0)),
            "A3" | "A4" | "B2" => Some((16.0, 2.0)),
            "B3" | "B4" => Some((16.0, 4.0)),
            _ => None,
        }
    }

    fn complication_probability(diagnosis: &str) -> f64 {
        match diagnosis {
            "A1" | "A2" | "B2" => 0.01,
            "A3" | "A4" | "B3" | "B4" => 0.02,
            "B1" => 0.001,
            _ => 0.0,
        }
    }

    fn sample_diagnosis(&mut self, diagnoses: &[&str; 4]) -> serde_json::Value {
        let index = self.rng.choose_weighted(&DIAGNOSIS_WEIGHTS).unwrap_or(0);
        serde_json::Value::String(diagnoses[index].to_string())
    }

    fn normal_duration(&mut self, (mean, sd): (f64, f64)) -> f64 {
        self.rng.normal(mean, sd).max(0.0)
    }

    fn new_task(&mut self, after: &Element, label: &str) -> Result<Element, ProblemError> {
        let id = self.ids.next_element_id();
        Ok(Element::task(id, after.case_id(), after.case_type(), label)?)
    }

    fn new_event(&mut self, after: &Element, label: &str, at: SimTime) -> Result<Element, ProblemError> {
        let id = self.ids.next_element_id();
        Ok(Element::event(id, after.case_id(), after.case_type(), label, at)?)
    }

    /// Surgery or nursing, whichever the diagnosis calls for first
    fn treatment_after_diagnosis(
        &mut self,
        after: &Element,
        diagnosis: &str,
    ) -> Result<Element, ProblemError> {
        let label = if Self::needs_surgery(diagnosis)? {
            labels::SURGERY
        } else {
            labels::NURSING
        };
        self.new_task(after, label)
    }
}

impl Problem for HealthcareProblem {
    fn resources(&self) -> Vec<Resource> {
        self.resources.clone()
    }

    fn next_case(&mut self) -> Result<Option<(SimTime, Element)>, ProblemError> {
        let Some(arrival) = self.arrivals.next_arrival(&mut self.rng) else {
            return Ok(None);
        };
        let label = if arrival.case_type == EMERGENCY_CASE_TYPE {
            labels::EMERGENCY_PATIENT
        } else {
            labels::PATIENT_REFERRAL
        };
        let id = self.ids.next_element_id();
        let element = Element::event(id, arrival.case_id, arrival.case_type, label, arrival.time)?;
        let data = self.data_sample(&element);
        Ok(Some((arrival.time, element.with_data(data))))
    }

    fn resource_pool(
        &self,
        element: &Element,
        case_data: &DataBag,
    ) -> Result<Vec<ResourceId>, ProblemError> {
        let resource_type = match element.label() {
            labels::SURGERY => resource_types::OR,
            labels::INTAKE => resource_types::INTAKE,
            labels::ER_TREATMENT => resource_types::ER_PRACTITIONER,
            labels::NURSING => {
                let diagnosis = Self::required_diagnosis(element.case_id(), case_data)?;
                if diagnosis.starts_with('A') {
                    resource_types::A_BED
                } else if diagnosis.starts_with('B') {
                    resource_types::B_BED
                } else {
                    return Err(ProblemError::Other(format!(
                        "no ward for diagnosis '{diagnosis}'"
                    )));
                }
            }
            other => return Err(ProblemError::UnknownLabel(other.to_string())),
        };
        Ok(self
            .resources
            .iter()
            .filter(|r| r.resource_type() == resource_type)
            .map(|r| r.id().clone())
            .collect())
    }

    fn resources_available(&self, resource: &Resource, time: SimTime) -> bool {
        if !Self::resource_type_available(resource.resource_type(), time) {
            return false;
        }
        if resource.resource_type() == resource_types::OR {
            return is_working_time(time) || resource.id().as_str() == ALWAYS_OPEN_OR;
        }
        true
    }

    fn processing_time_sample(
        &mut self,
        _resource: &Resource,
        element: &Element,
        case_data: &DataBag,
        time: SimTime,
    ) -> Result<SimTime, ProblemError> {
        match element.label() {
            labels::INTAKE => Ok(self.normal_duration((1.0, 0.125))),
            labels::ER_TREATMENT => Ok(self.normal_duration((2.0, 0.5))),
            labels::SURGERY => {
                let diagnosis = Self::required_diagnosis(element.case_id(), case_data)?;
                let params = Self::surgery_duration(&diagnosis).ok_or_else(|| {
                    ProblemError::Other(format!("no surgery for diagnosis '{diagnosis}'"))
                })?;
                Ok(self.normal_duration(params))
            }
            labels::NURSING => {
                // Nursing occupies the bed until the next batch release
                let diagnosis = Self::required_diagnosis(element.case_id(), case_data)?;
                let params = Self::nursing_duration(&diagnosis).ok_or_else(|| {
                    ProblemError::Other(format!("no nursing for diagnosis '{diagnosis}'"))
                })?;
                let finish = time + self.normal_duration(params);
                Ok(Self::next_release_time(finish) - time)
            }
            other => Err(ProblemError::UnknownLabel(other.to_string())),
        }
    }

    fn complete_element(
        &mut self,
        element: &Element,
        ctx: &mut TransitionContext<'_>,
    ) -> Result<Vec<Element>, ProblemError> {
        let now = ctx.now();
        let case_id = element.case_id();

        let next = match element.label() {
            labels::PATIENT_REFERRAL => {
                self.plannable.add(case_id, labels::TIME_FOR_INTAKE);
                Some(self.new_event(element, labels::PATIENT_LEFT, now + self.config.patience)?)
            }
            labels::TIME_FOR_INTAKE => {
                let desk_free = Self::resource_type_available(resource_types::INTAKE, now)
                    && ctx.has_available(resource_types::INTAKE);
                if desk_free
                    && self.patients_after_intake.len() < self.config.max_waiting_after_intake
                {
                    ctx.cancel(case_id, labels::PATIENT_LEFT);
                    Some(self.new_task(element, labels::INTAKE)?)
                } else {
                    debug!("{} sent home at {}, intake to be replanned", case_id, now);
                    self.plannable.add(case_id, labels::TIME_FOR_INTAKE);
                    None
                }
            }
            labels::PATIENT_LEFT => {
                self.plannable.remove(case_id, labels::TIME_FOR_INTAKE);
                ctx.cancel(case_id, labels::TIME_FOR_INTAKE);
                None
            }
            labels::INTAKE => {
                ctx.cancel(case_id, labels::PATIENT_LEFT);
                ctx.cancel(case_id, labels::TIME_FOR_INTAKE);
                self.patients_after_intake.push(case_id);
                let diagnosis = Self::required_diagnosis(case_id, Self::case_data(ctx, case_id)?)?;
                Some(self.treatment_after_diagnosis(element, &diagnosis)?)
            }
            labels::SURGERY => Some(self.new_task(element, labels::NURSING)?),
            labels::EMERGENCY_PATIENT => Some(self.new_task(element, labels::ER_TREATMENT)?),
            labels::ER_TREATMENT => {
                match Self::diagnosis(case_id, Self::case_data(ctx, case_id)?)? {
                    None => Some(self.new_event(element, labels::RELEASING, now)?),
                    Some(diagnosis) => {
                        self.er_treatment_finished.insert(case_id, now);
                        Some(self.treatment_after_diagnosis(element, &diagnosis)?)
                    }
                }
            }
            labels::NURSING => {
                let diagnosis = Self::required_diagnosis(case_id, Self::case_data(ctx, case_id)?)?;
                if self.rng.bernoulli(Self::complication_probability(&diagnosis)) {
                    debug!("{} has a complication after nursing", case_id);
                    Some(self.treatment_after_diagnosis(element, &diagnosis)?)
                } else {
                    let release = Self::next_release_time(now);
                    Some(self.new_event(element, labels::RELEASING, release)?)
                }
            }
            labels::RELEASING => None,
            other => return Err(ProblemError::UnknownLabel(other.to_string())),
        };

        Ok(next.into_iter().collect())
    }

    fn data_sample(&mut self, element: &Element) -> DataBag {
        let mut data = DataBag::new();
        if !matches!(
            element.label(),
            labels::PATIENT_REFERRAL | labels::EMERGENCY_PATIENT
        ) {
            return data;
        }
        let diagnosis = match element.case_type() {
            "A" => self.sample_diagnosis(&A_DIAGNOSES),
            "B" => self.sample_diagnosis(&B_DIAGNOSES),
            EMERGENCY_CASE_TYPE => {
                if self.rng.next_f64() > 0.5 {
                    self.sample_diagnosis(&B_DIAGNOSES)
                } else {
                    serde_json::Value::Null
                }
            }
            _ => return data,
        };
        data.insert(DIAGNOSIS_KEY.to_string(), diagnosis);
        data
    }

    fn next_regular_planning_moment(&self, previous: SimTime) -> SimTime {
        if previous <= 0.0 {
            self.config.first_planning_moment
        } else {
            previous + self.config.planning_interval
        }
    }

    fn next_element_id(&mut self) -> ElementId {
        self.ids.next_element_id()
    }

    fn plannable(&self) -> &PlannableSet {
        &self.plannable
    }

    fn plannable_mut(&mut self) -> &mut PlannableSet {
        &mut self.plannable
    }

    fn is_prioritized(&self, element: &Element) -> bool {
        element.case_type() == EMERGENCY_CASE_TYPE
    }

    fn plan(
        &mut self,
        case_id: CaseId,
        label: &str,
        time: SimTime,
        ctx: &PlanContext<'_>,
    ) -> Result<Vec<Element>, PlanningError> {
        if label == labels::TIME_FOR_INTAKE {
            let earliest = ctx.now + self.config.intake_lead_time;
            if time < earliest {
                return Err(PlanningError::LeadTimeViolated {
                    case_id,
                    label: label.to_string(),
                    time,
                    earliest,
                });
            }
        }
        materialize_planned_event(self, case_id, label, time, ctx)
    }

    fn task_started(&mut self, element: &Element, now: SimTime) {
        if !matches!(element.label(), labels::SURGERY | labels::NURSING) {
            return;
        }
        let case_id = element.case_id();
        self.patients_after_intake.retain(|c| *c != case_id);
        if element.case_type() == EMERGENCY_CASE_TYPE {
            self.er_followup_started.entry(case_id).or_insert(now);
        }
    }

    fn restart(&mut self) {
        self.rng = RngManager::new(self.config.seed);
        self.arrivals.reset(&mut self.rng);
        self.ids.reset();
        self.plannable.clear();
        self.patients_after_intake.clear();
        self.er_treatment_finished.clear();
        self.er_followup_started.clear();
    }

    fn evaluate(&self, run: &RunSummary<'_>) -> Evaluation {
        let weights = &self.config.penalties;
        let started = run.cases_started();
        if started == 0 {
            return Evaluation::new()
                .with("er_treatment_score", 0.0)
                .with("sent_home_score", 0.0)
                .with("processed_score", 0.0);
        }
        let started_f = started as f64;

        let excessive_er_wait: f64 = self
            .er_treatment_finished
            .iter()
            .map(|(case_id, finished)| {
                let followup = self
                    .er_followup_started
                    .get(case_id)
                    .copied()
                    .unwrap_or(run.now);
                let wait = followup - finished;
                if wait < weights.er_wait_threshold {
                    0.0
                } else {
                    (wait - weights.er_wait_threshold).powi(2)
                }
            })
            .sum();

        let mut intake_moments: BTreeMap<CaseId, usize> = BTreeMap::new();
        for completion in run.history.completions_of(labels::TIME_FOR_INTAKE) {
            *intake_moments.entry(completion.case_id).or_default() += 1;
        }
        let sent_home: usize = intake_moments.values().filter(|n| **n > 1).sum();

        let released = run.history.completions_of(labels::RELEASING).count();
        let unprocessed = started.saturating_sub(released) as f64;

        Evaluation::new()
            .with(
                "er_treatment_score",
                excessive_er_wait / started_f * weights.er_treatment,
            )
            .with("sent_home_score", sent_home as f64 / started_f * weights.sent_home)
            .with("processed_score", unprocessed * weights.unprocessed / started_f)
    }
}
