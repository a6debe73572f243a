use crate::evaluate::{aggregate, evaluate, AggregateOutcome, Evaluation, EvaluationError, Thresholds};
use crate::table::{decode_volume_table, DecodeError, VolumeRecord};
use crate::units::{normalize, NormalizeError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum ProbeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

#[derive(Debug, Clone)]
pub struct ProbeOptions<'a> {
    pub index_oid: &'a str,
    pub thresholds: Thresholds,
    pub include_perfdata: bool,
}

/// Everything one run produces: the normalized volumes, one evaluation per
/// volume (same order, unfiltered) and the verdict over them.
#[derive(Debug, Clone)]
pub struct ProbeRun {
    pub volumes: Vec<VolumeRecord>,
    pub evaluations: Vec<Evaluation>,
    pub outcome: AggregateOutcome,
}

/// Decode, normalize and evaluate one captured walk of the volume table.
/// The first error aborts the run; no partial outcome is returned.
pub fn analyze(walk: &str, opts: &ProbeOptions<'_>) -> Result<ProbeRun, ProbeError> {
    let decoded = decode_volume_table(walk, opts.index_oid)?;
    debug!(volumes = decoded.len(), "decoded volume table");

    let volumes = decoded
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>, _>>()?;
    let evaluations = volumes
        .iter()
        .map(|v| evaluate(v, &opts.thresholds))
        .collect::<Result<Vec<_>, _>>()?;

    let outcome = aggregate(&evaluations, opts.include_perfdata);
    Ok(ProbeRun {
        volumes,
        evaluations,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use crate::table::tests::{INDEX_OID, THREE_VOLUMES, TWO_VOLUMES};

    fn opts(include_perfdata: bool) -> ProbeOptions<'static> {
        ProbeOptions {
            index_oid: INDEX_OID,
            thresholds: Thresholds::default(),
            include_perfdata,
        }
    }

    #[test]
    fn three_volume_walk_warns_on_single_disk() {
        let run = analyze(THREE_VOLUMES, &opts(true)).expect("analyze");
        assert_eq!(run.volumes.len(), 3);
        assert_eq!(run.outcome.status, Status::Warning);
        assert_eq!(
            run.outcome.problems,
            vec!["[Single Disk Volume:  REXP#34 Drive: 6] above warning threshold"]
        );
        assert_eq!(run.outcome.perfdata.len(), 3);
    }

    #[test]
    fn unmounted_volume_makes_the_run_critical() {
        let run = analyze(TWO_VOLUMES, &opts(false)).expect("analyze");
        assert_eq!(run.outcome.status, Status::Critical);
        assert_eq!(
            run.outcome.problems,
            vec!["[Volume Volume-2, Pool 2] status Unmounted"]
        );
        assert!(run.outcome.perfdata.is_empty());
    }

    #[test]
    fn evaluations_are_kept_without_perfdata_flag() {
        let run = analyze(THREE_VOLUMES, &opts(false)).expect("analyze");
        assert_eq!(run.outcome.perfdata.len(), 1);
        assert_eq!(run.evaluations.len(), 3);
        assert!(run.evaluations.iter().all(|e| e.perfdata.is_some()));
        assert_eq!(run.evaluations[2].used_percent, Some(88.87));
    }

    #[test]
    fn empty_walk_is_ok() {
        let run = analyze("", &opts(true)).expect("analyze");
        assert!(run.volumes.is_empty());
        assert_eq!(run.outcome.status, Status::Ok);
    }

    #[test]
    fn decode_errors_abort_the_run() {
        let walk = r#".1.3.6.1.4.1.24681.1.2.17.1.1.1 = INTEGER: 1
.1.3.6.1.4.1.24681.1.2.17.1.1.2 = INTEGER: 2
.1.3.6.1.4.1.24681.1.2.17.1.1.3 = INTEGER: 3
.1.3.6.1.4.1.24681.1.2.17.1.2.1 = STRING: "VolA"
.1.3.6.1.4.1.24681.1.2.17.1.2.2 = STRING: "VolB"
"#;
        assert!(matches!(
            analyze(walk, &opts(true)),
            Err(ProbeError::Decode(DecodeError::Truncated { .. }))
        ));
    }

    #[test]
    fn unknown_unit_aborts_the_run() {
        let walk = THREE_VOLUMES.replace("\"8.79 TB\"", "\"8.79 PB\"");
        assert_eq!(
            analyze(&walk, &opts(true)).unwrap_err(),
            ProbeError::Normalize(NormalizeError::UnknownUnit("PB".to_string()))
        );
    }
}
