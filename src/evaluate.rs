use crate::status::Status;
use crate::table::{Size, VolumeRecord};
use crate::units::{Measurement, Unit};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Used-space percentages. The evaluator applies them exactly as given; the
/// configuration layer is responsible for `warning_percent < critical_percent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Thresholds {
    #[serde(default = "default_warning_percent")]
    pub warning_percent: u32,
    #[serde(default = "default_critical_percent")]
    pub critical_percent: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_percent: default_warning_percent(),
            critical_percent: default_critical_percent(),
        }
    }
}

const fn default_warning_percent() -> u32 {
    80
}

const fn default_critical_percent() -> u32 {
    90
}

/// One performance-data tuple, rendered as
/// `'label'=used<unit>;warning;critical;0;total`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfData {
    pub label: String,
    pub used: f64,
    pub unit: Unit,
    pub warning: i64,
    pub critical: i64,
    pub min: i64,
    pub total: f64,
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}'={:.2}{};{};{};{};{}",
            self.label, self.used, self.unit, self.warning, self.critical, self.min, self.total
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: Status,
    pub used_percent: Option<f64>,
    pub perfdata: Option<PerfData>,
    pub problem: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateOutcome {
    pub status: Status,
    pub problems: Vec<String>,
    pub perfdata: Vec<PerfData>,
}

#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    #[error("{description}: total size is zero")]
    ZeroTotal { description: String },
    #[error("{description}: free size in {free} does not match total size in {total}")]
    UnitMismatch {
        description: String,
        total: String,
        free: String,
    },
    #[error("{description}: volume is Ready but reports no usable size")]
    Unmeasured { description: String },
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn used_percent(total: f64, free: f64) -> f64 {
    round2((total - free) * 100.0 / total)
}

fn boundary(total: f64, percent: u32) -> i64 {
    (total / 100.0 * f64::from(percent)).round() as i64
}

/// Classify an integral used percentage. A value equal to the critical
/// threshold is still a warning.
pub fn classify(used: i64, thresholds: &Thresholds) -> Status {
    if used > i64::from(thresholds.critical_percent) {
        Status::Critical
    } else if used > i64::from(thresholds.warning_percent) {
        Status::Warning
    } else {
        Status::Ok
    }
}

fn measurements(record: &VolumeRecord) -> Result<(&Measurement, &Measurement), EvaluationError> {
    match (&record.total_size, &record.free_size) {
        (Size::Measured(total), Size::Measured(free)) => Ok((total, free)),
        _ => Err(EvaluationError::Unmeasured {
            description: record.description.clone(),
        }),
    }
}

/// Evaluate a normalized volume against the thresholds.
pub fn evaluate(record: &VolumeRecord, thresholds: &Thresholds) -> Result<Evaluation, EvaluationError> {
    if !record.is_ready() {
        info!(volume = %record.description, status = %record.status, "volume not ready");
        return Ok(Evaluation {
            status: Status::Critical,
            used_percent: None,
            perfdata: None,
            problem: Some(format!("{} status {}", record.description, record.status)),
        });
    }

    let (total, free) = measurements(record)?;
    if total.unit != free.unit {
        return Err(EvaluationError::UnitMismatch {
            description: record.description.clone(),
            total: total.unit.to_string(),
            free: free.unit.to_string(),
        });
    }
    if total.value == 0.0 {
        return Err(EvaluationError::ZeroTotal {
            description: record.description.clone(),
        });
    }

    let pct = used_percent(total.value, free.value);
    let status = classify(pct.round() as i64, thresholds);
    let perfdata = PerfData {
        label: record.description.clone(),
        used: round2(total.value - free.value),
        unit: total.unit.clone(),
        warning: boundary(total.value, thresholds.warning_percent),
        critical: boundary(total.value, thresholds.critical_percent),
        min: 0,
        total: total.value,
    };
    let problem = match status {
        Status::Warning => Some(format!("{} above warning threshold", record.description)),
        Status::Critical => Some(format!("{} above critical threshold", record.description)),
        _ => None,
    };
    if problem.is_some() {
        info!(volume = %record.description, used_percent = pct, %status, "volume above threshold");
    }

    Ok(Evaluation {
        status,
        used_percent: Some(pct),
        perfdata: Some(perfdata),
        problem,
    })
}

/// Fold per-volume evaluations, in input order, into the verdict for the run.
/// Perf data of OK volumes is only kept when `include_perfdata` is set.
pub fn aggregate(evaluations: &[Evaluation], include_perfdata: bool) -> AggregateOutcome {
    let mut outcome = AggregateOutcome::default();
    for eval in evaluations {
        debug!(status = %eval.status, used_percent = ?eval.used_percent, "volume evaluated");
        outcome.status = outcome.status.max(eval.status);
        if let Some(problem) = &eval.problem {
            outcome.problems.push(problem.clone());
        }
        if let Some(perf) = &eval.perfdata {
            if include_perfdata || eval.status != Status::Ok {
                outcome.perfdata.push(perf.clone());
            }
        }
    }
    outcome
}
