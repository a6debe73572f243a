use crate::table::{Size, VolumeRecord};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Capacity unit as reported by the device. Anything outside MB/GB/TB is kept
/// verbatim so it can be reported when normalization refuses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Megabytes,
    Gigabytes,
    Terabytes,
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub unit: Unit,
}

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("unknown unit: {0}")]
    UnknownUnit(String),
    #[error("{description}: volume is Ready but reports no usable size")]
    Unmeasured { description: String },
}

impl Unit {
    pub fn parse(symbol: &str) -> Self {
        match symbol {
            "MB" => Unit::Megabytes,
            "GB" => Unit::Gigabytes,
            "TB" => Unit::Terabytes,
            other => Unit::Other(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Unit::Megabytes => "MB",
            Unit::Gigabytes => "GB",
            Unit::Terabytes => "TB",
            Unit::Other(s) => s,
        }
    }

    /// Decimal magnitude in steps of 1000, relative to MB.
    fn magnitude(&self) -> Result<i32, NormalizeError> {
        match self {
            Unit::Megabytes => Ok(0),
            Unit::Gigabytes => Ok(1),
            Unit::Terabytes => Ok(2),
            Unit::Other(s) => Err(NormalizeError::UnknownUnit(s.clone())),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Serialize for Unit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl Measurement {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Express `m` in `target`. Same-unit conversion returns the input
/// untouched; otherwise the value is scaled by 1000 per step.
pub fn convert(m: &Measurement, target: &Unit) -> Result<Measurement, NormalizeError> {
    let from = m.unit.magnitude()?;
    let to = target.magnitude()?;
    if from == to {
        return Ok(m.clone());
    }

    let factor = 1000_f64.powi((from - to).abs());
    let value = if to > from {
        m.value / factor
    } else {
        m.value * factor
    };
    Ok(Measurement::new(value, target.clone()))
}

/// Rewrite the free size of a Ready volume into the unit of its total size.
/// Volumes in any other state come back unchanged.
pub fn normalize(record: &VolumeRecord) -> Result<VolumeRecord, NormalizeError> {
    if !record.is_ready() {
        return Ok(record.clone());
    }

    let (total, free) = match (&record.total_size, &record.free_size) {
        (Size::Measured(total), Size::Measured(free)) => (total, free),
        _ => {
            return Err(NormalizeError::Unmeasured {
                description: record.description.clone(),
            })
        }
    };

    total.unit.magnitude()?;
    let free = convert(free, &total.unit)?;

    Ok(VolumeRecord {
        free_size: Size::Measured(free),
        ..record.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::VolumeStatus;

    fn m(value: f64, unit: &str) -> Measurement {
        Measurement::new(value, Unit::parse(unit))
    }

    fn ready(total: Measurement, free: Measurement) -> VolumeRecord {
        VolumeRecord {
            description: "[Volume Volume-1, Pool 1]".to_string(),
            total_size: Size::Measured(total),
            free_size: Size::Measured(free),
            status: VolumeStatus::Ready,
        }
    }

    #[test]
    fn converts_with_decimal_factors() {
        let cases = [
            (m(1500.0, "MB"), "GB", 1.5),
            (m(300.0, "MB"), "TB", 0.0003),
            (m(228.0, "GB"), "TB", 0.228),
            (m(0.77, "TB"), "MB", 770_000.0),
            (m(890.5, "GB"), "MB", 890_500.0),
            (m(150.0, "TB"), "GB", 150_000.0),
            (m(150.0, "TB"), "MB", 150_000_000.0),
        ];
        for (input, unit, expected) in cases {
            let got = convert(&input, &Unit::parse(unit)).expect("supported units");
            assert!(
                (got.value - expected).abs() < 1e-9 * expected.max(1.0),
                "{input} -> {unit}: got {}, want {expected}",
                got.value
            );
            assert_eq!(got.unit.symbol(), unit);
        }
    }

    #[test]
    fn same_unit_is_identity() {
        for unit in ["MB", "GB", "TB"] {
            let input = m(0.1 + 0.2, unit);
            let got = convert(&input, &Unit::parse(unit)).expect("supported unit");
            assert_eq!(got.value.to_bits(), input.value.to_bits());
        }
    }

    #[test]
    fn conversion_round_trips() {
        let units = ["MB", "GB", "TB"];
        for a in units {
            for b in units {
                let start = m(916.39, a);
                let there = convert(&start, &Unit::parse(b)).expect("a -> b");
                let back = convert(&there, &Unit::parse(a)).expect("b -> a");
                assert!((back.value - start.value).abs() < 1e-9, "{a} <-> {b}");
            }
        }
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let err = convert(&m(150.8, "TB"), &Unit::parse("KB")).unwrap_err();
        assert_eq!(err, NormalizeError::UnknownUnit("KB".to_string()));

        let err = convert(&m(150.8, "PB"), &Unit::parse("TB")).unwrap_err();
        assert_eq!(err, NormalizeError::UnknownUnit("PB".to_string()));
    }

    #[test]
    fn normalize_leaves_matching_units_alone() {
        let record = ready(m(10.77, "TB"), m(8.79, "TB"));
        let normalized = normalize(&record).expect("normalize");
        assert_eq!(normalized, record);
    }

    #[test]
    fn normalize_rewrites_free_size_into_total_unit() {
        let record = ready(m(10.77, "TB"), m(388.0, "MB"));
        let normalized = normalize(&record).expect("normalize");

        assert_eq!(normalized.description, record.description);
        assert_eq!(normalized.total_size, record.total_size);
        assert_eq!(normalized.status, record.status);
        match normalized.free_size {
            Size::Measured(free) => {
                assert_eq!(free.unit, Unit::Terabytes);
                assert!((free.value - 0.000388).abs() < 1e-12);
            }
            other => panic!("unexpected free size {other:?}"),
        }
    }

    #[test]
    fn normalize_skips_volumes_that_are_not_ready() {
        let record = VolumeRecord {
            description: "VolD".to_string(),
            total_size: Size::Unreported("--".to_string()),
            free_size: Size::Measured(m(1.0, "XB")),
            status: VolumeStatus::Unmounted,
        };
        assert_eq!(normalize(&record).expect("no-op"), record);
    }

    #[test]
    fn normalize_rejects_unknown_total_unit() {
        let record = ready(m(10.0, "KB"), m(2.0, "KB"));
        assert_eq!(
            normalize(&record).unwrap_err(),
            NormalizeError::UnknownUnit("KB".to_string())
        );
    }
}
