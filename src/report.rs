use crate::evaluate::AggregateOutcome;
use crate::status::Status;
use clap::ValueEnum;
use std::fmt::Display;

const ALL_OK: &str = "volumes free space Ok - volumes status Ok";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Nagios status line: the verdict, the problems (or the all-clear) and,
/// when requested, the perf data after a `|`.
pub fn render_text(outcome: &AggregateOutcome, include_perfdata: bool) -> String {
    let mut line = format!("{}: ", outcome.status);
    if outcome.status == Status::Ok {
        line.push_str(ALL_OK);
    } else {
        line.push_str(&outcome.problems.join(", "));
    }

    if include_perfdata && !outcome.perfdata.is_empty() {
        let perf: Vec<String> = outcome.perfdata.iter().map(ToString::to_string).collect();
        line.push_str(" | ");
        line.push_str(&perf.join(" "));
    }
    line
}

pub fn render_json(outcome: &AggregateOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string(outcome)
}

/// Any failure of the run collapses to UNKNOWN with the error as diagnostic.
pub fn render_unknown(err: &dyn Display) -> String {
    format!("{}: {err}", Status::Unknown)
}
