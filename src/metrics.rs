use crate::probe::ProbeRun;
use crate::status::Status;
use prometheus::core::Collector;
use prometheus::{opts, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::path::Path;

/// Per-volume gauges for the node exporter textfile collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub qnap_volume_total: GaugeVec,
    pub qnap_volume_used: GaugeVec,
    pub qnap_volume_used_percent: GaugeVec,
    pub qnap_volume_ready: GaugeVec,
    pub qnap_volume_count: Gauge,
    pub qnap_probe_status: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let qnap_volume_total = GaugeVec::new(
            opts!("qnap_volume_total", "Volume capacity in the reported unit"),
            &["volume", "unit"],
        )?;
        let qnap_volume_used = GaugeVec::new(
            opts!("qnap_volume_used", "Used volume space in the reported unit"),
            &["volume", "unit"],
        )?;
        let qnap_volume_used_percent = GaugeVec::new(
            opts!("qnap_volume_used_percent", "Used volume space in percent"),
            &["volume", "unit"],
        )?;
        let qnap_volume_ready = GaugeVec::new(
            opts!("qnap_volume_ready", "1 if the volume reports status Ready"),
            &["volume"],
        )?;
        let qnap_volume_count =
            Gauge::with_opts(opts!("qnap_volume_count", "Number of volumes in the table"))?;
        let qnap_probe_status = Gauge::with_opts(opts!(
            "qnap_probe_status",
            "Probe verdict: 0 ok, 1 warning, 2 critical, 3 unknown"
        ))?;

        register(&registry, &qnap_volume_total)?;
        register(&registry, &qnap_volume_used)?;
        register(&registry, &qnap_volume_used_percent)?;
        register(&registry, &qnap_volume_ready)?;
        register(&registry, &qnap_volume_count)?;
        register(&registry, &qnap_probe_status)?;

        Ok(Self {
            registry,
            qnap_volume_total,
            qnap_volume_used,
            qnap_volume_used_percent,
            qnap_volume_ready,
            qnap_volume_count,
            qnap_probe_status,
        })
    }

    pub fn update_from_run(&self, run: &ProbeRun) {
        self.qnap_volume_total.reset();
        self.qnap_volume_used.reset();
        self.qnap_volume_used_percent.reset();
        self.qnap_volume_ready.reset();

        for (volume, eval) in run.volumes.iter().zip(&run.evaluations) {
            self.qnap_volume_ready
                .with_label_values(&[&volume.description])
                .set(if volume.is_ready() { 1.0 } else { 0.0 });

            let Some(perf) = &eval.perfdata else {
                continue;
            };
            let labels = [volume.description.as_str(), perf.unit.symbol()];
            self.qnap_volume_total.with_label_values(&labels).set(perf.total);
            self.qnap_volume_used.with_label_values(&labels).set(perf.used);
            if let Some(pct) = eval.used_percent {
                self.qnap_volume_used_percent.with_label_values(&labels).set(pct);
            }
        }
        self.qnap_volume_count.set(run.volumes.len() as f64);
        self.set_status(run.outcome.status);
    }

    pub fn set_status(&self, status: Status) {
        self.qnap_probe_status.set(f64::from(status.exit_code()));
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }

    /// Replace `path` atomically so the collector never reads a partial file.
    pub fn write_textfile(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let encoded = self
            .encode_metrics()
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, encoded)?;
        std::fs::rename(&tmp, path)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}
