mod collectors;
mod config;
mod evaluate;
mod metrics;
mod probe;
mod report;
mod status;
mod table;
mod units;

use clap::Parser;
use collectors::snmp::{walk_volume_table, SnmpError};
use config::{Config, ConfigError};
use evaluate::AggregateOutcome;
use metrics::Metrics;
use probe::{analyze, ProbeError, ProbeOptions, ProbeRun};
use report::{render_json, render_text, render_unknown, OutputFormat};
use status::Status;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "check_snmp_qnap_volspace")]
#[command(version, about = "Check free space and status of QNAP volumes over SNMP")]
struct Cli {
    /// Name or IP address of the host to check
    #[arg(short = 'H', long)]
    host: Option<String>,
    /// Community name for the host's SNMP agent
    #[arg(short = 'C', long)]
    community: Option<String>,
    /// SNMP port
    #[arg(short, long)]
    port: Option<u16>,
    /// Percent of volume space used to generate WARNING state
    #[arg(short, long)]
    warning: Option<u32>,
    /// Percent of volume space used to generate CRITICAL state
    #[arg(short, long)]
    critical: Option<u32>,
    /// Perfparse compatible output
    #[arg(short = 'f', long)]
    perfdata: bool,
    /// Timeout for SNMP in seconds
    #[arg(short, long, allow_negative_numbers = true)]
    timeout: Option<i64>,
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
    /// Write Prometheus gauges to this file (textfile collector format)
    #[arg(long)]
    textfile: Option<String>,
}

#[derive(Debug, Error)]
enum CheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snmp(#[from] SnmpError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl Cli {
    /// Command-line values win over the config file.
    fn apply(&self, cfg: &mut Config) {
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(community) = &self.community {
            cfg.community = community.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(warning) = self.warning {
            cfg.thresholds.warning_percent = warning;
        }
        if let Some(critical) = self.critical {
            cfg.thresholds.critical_percent = critical;
        }
        if self.perfdata {
            cfg.perfdata = true;
        }
        match self.timeout {
            Some(secs) if secs > 0 => cfg.timeout = format!("{secs}s"),
            Some(_) => cfg.timeout = config::default_timeout(),
            None => {}
        }
        if let Some(path) = &self.textfile {
            cfg.textfile = Some(path.clone());
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            println!("{}", render_failure(cli.output, &err));
            Status::Unknown.exit();
        }
    };

    let status = match check(&cfg).await {
        Ok(run) => {
            info!(status = %run.outcome.status, volumes = run.volumes.len(), "check finished");
            export_metrics(&cfg, Some(&run), run.outcome.status);
            println!("{}", render_outcome(cli.output, &run.outcome, cfg.perfdata));
            run.outcome.status
        }
        Err(err) => {
            error!(error = %err, "check failed");
            export_metrics(&cfg, None, Status::Unknown);
            println!("{}", render_failure(cli.output, &err));
            Status::Unknown
        }
    };
    status.exit();
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    cli.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

async fn check(cfg: &Config) -> Result<ProbeRun, CheckError> {
    let timeout = cfg.timeout_duration()?;
    let walk = walk_volume_table(cfg, timeout).await?;
    let opts = ProbeOptions {
        index_oid: &cfg.index_oid,
        thresholds: cfg.thresholds,
        include_perfdata: cfg.perfdata,
    };
    Ok(analyze(&walk, &opts)?)
}

fn export_metrics(cfg: &Config, run: Option<&ProbeRun>, status: Status) {
    let Some(path) = &cfg.textfile else {
        return;
    };
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            warn!(error = %err, "failed to initialise metrics");
            return;
        }
    };
    match run {
        Some(run) => metrics.update_from_run(run),
        None => metrics.set_status(status),
    }
    if let Err(err) = metrics.write_textfile(path) {
        warn!(error = %err, path = %path, "failed to write metrics textfile");
    }
}

fn render_outcome(format: OutputFormat, outcome: &AggregateOutcome, include_perfdata: bool) -> String {
    match format {
        OutputFormat::Text => render_text(outcome, include_perfdata),
        OutputFormat::Json => render_json(outcome).unwrap_or_else(|err| render_unknown(&err)),
    }
}

fn render_failure(format: OutputFormat, err: &dyn std::fmt::Display) -> String {
    match format {
        OutputFormat::Text => render_unknown(err),
        OutputFormat::Json => {
            let outcome = AggregateOutcome {
                status: Status::Unknown,
                problems: vec![err.to_string()],
                perfdata: Vec::new(),
            };
            render_outcome(format, &outcome, false)
        }
    }
}
