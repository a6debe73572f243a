use crate::config::Config;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time;
use tracing::{debug, warn};

/// Extra time given to snmpwalk on top of its own per-request timeout.
const GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout}")]
    Timeout {
        program: String,
        timeout: humantime::Duration,
    },
    #[error("{program} exited with {status}: {}", .output.trim())]
    Failed {
        program: String,
        status: String,
        output: String,
    },
}

/// Arguments for a single, non-retrying v2c walk of the volume table with
/// numeric OIDs.
pub fn walk_args(cfg: &Config, timeout: Duration) -> Vec<String> {
    vec![
        "-v2c".to_string(),
        "-c".to_string(),
        cfg.community.clone(),
        "-r0".to_string(),
        "-On".to_string(),
        format!("-t{}", timeout.as_secs().max(1)),
        cfg.agent(),
        cfg.table_oid.clone(),
    ]
}

/// Walk the volume table and return the captured text.
pub async fn walk_volume_table(cfg: &Config, timeout: Duration) -> Result<String, SnmpError> {
    let args = walk_args(cfg, timeout);
    debug!(program = %cfg.snmpwalk_path, agent = %cfg.agent(), "walking volume table");
    run_command(&cfg.snmpwalk_path, &args, timeout + GRACE).await
}

async fn run_command(program: &str, args: &[String], deadline: Duration) -> Result<String, SnmpError> {
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);

    let output = match time::timeout(deadline, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            warn!(program, error = %source, "snmpwalk could not be started");
            return Err(SnmpError::Spawn {
                program: program.to_string(),
                source,
            });
        }
        Err(_elapsed) => {
            warn!(program, "snmpwalk timeout");
            return Err(SnmpError::Timeout {
                program: program.to_string(),
                timeout: deadline.into(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        warn!(program, status = %output.status, "snmpwalk failed");
        return Err(SnmpError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            output: format!("{stdout}{stderr}"),
        });
    }
    if !stderr.trim().is_empty() {
        warn!(program, stderr = %stderr.trim(), "snmpwalk wrote to stderr");
    }

    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn walk_args_match_snmpwalk_cli() {
        let cfg = Config {
            host: "nas".to_string(),
            port: 1161,
            community: "secret".to_string(),
            ..Config::default()
        };
        assert_eq!(
            walk_args(&cfg, Duration::from_secs(10)),
            vec![
                "-v2c",
                "-c",
                "secret",
                "-r0",
                "-On",
                "-t10",
                "nas:1161",
                "1.3.6.1.4.1.24681.1.2.17",
            ]
        );
        assert!(walk_args(&cfg, Duration::from_millis(200)).contains(&"-t1".to_string()));
    }

    #[tokio::test]
    async fn captures_stdout() {
        let script = sh("printf 'a = STRING: \"x\"\\n'");
        let out = run_command("/bin/sh", &script, Duration::from_secs(5))
            .await
            .expect("command succeeds");
        assert_eq!(out, "a = STRING: \"x\"\n");
    }

    #[tokio::test]
    async fn stderr_is_not_part_of_the_walk() {
        let script = sh("echo 'MIB search path: /nope' >&2; printf 'a = INTEGER: 1\\n'");
        let out = run_command("/bin/sh", &script, Duration::from_secs(5))
            .await
            .expect("command succeeds");
        assert_eq!(out, "a = INTEGER: 1\n");
    }

    #[tokio::test]
    async fn failure_keeps_output_for_diagnostics() {
        let script = sh("echo 'Timeout: No Response' >&2; exit 1");
        let err = run_command("/bin/sh", &script, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            SnmpError::Failed { output, .. } => assert!(output.contains("No Response")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run_command("/bin/sh", &sh("sleep 5"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SnmpError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = run_command("/nonexistent/snmpwalk", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SnmpError::Spawn { .. }));
    }
}
