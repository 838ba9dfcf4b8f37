//! `ResourceQuantity`: a non-negative rational number tagged with a unit
//! class (CPU millicores or memory bytes), parsed from and rendered back to
//! the human-readable forms Kubernetes uses (`150m`, `256Mi`, `1.5`, `2Gi`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which dimension a quantity belongs to. Arithmetic and comparison across
/// classes is rejected rather than silently coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitClass {
    /// Millicores.
    Cpu,
    /// Bytes.
    Memory,
}

impl fmt::Display for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitClass::Cpu => write!(f, "cpu"),
            UnitClass::Memory => write!(f, "memory"),
        }
    }
}

/// A non-negative quantity in its class's base unit (millicores for CPU,
/// bytes for memory). Stored as `f64` per the History & Predictor component,
/// which needs fractional values for averages and forecasts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceQuantity {
    base_units: f64,
    unit: UnitClass,
}

impl ResourceQuantity {
    /// Construct a CPU quantity from a millicore count.
    pub fn cpu_millis(millis: f64) -> Self {
        Self {
            base_units: millis.max(0.0),
            unit: UnitClass::Cpu,
        }
    }

    /// Construct a memory quantity from a byte count.
    pub fn memory_bytes(bytes: f64) -> Self {
        Self {
            base_units: bytes.max(0.0),
            unit: UnitClass::Memory,
        }
    }

    pub fn unit(&self) -> UnitClass {
        self.unit
    }

    /// Base-unit value: millicores for CPU, bytes for memory.
    pub fn base_units(&self) -> f64 {
        self.base_units
    }

    pub fn is_zero(&self) -> bool {
        self.base_units == 0.0
    }

    /// Parse a Kubernetes-style quantity string for a known unit class.
    ///
    /// CPU: `"150m"` (millicores) or `"1.5"` (cores). Memory: binary suffixes
    /// `Ki`/`Mi`/`Gi`/`Ti`/`Pi`/`Ei`, decimal suffixes `k`/`M`/`G`/`T`/`P`/`E`,
    /// or a bare byte count.
    pub fn parse(input: &str, unit: UnitClass) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidQuantity {
                input: input.to_string(),
                reason: "empty string".into(),
            });
        }

        let base_units = match unit {
            UnitClass::Cpu => parse_cpu(trimmed)?,
            UnitClass::Memory => parse_memory(trimmed)?,
        };

        if base_units < 0.0 || !base_units.is_finite() {
            return Err(Error::InvalidQuantity {
                input: input.to_string(),
                reason: "quantity must be a non-negative finite number".into(),
            });
        }

        Ok(Self { base_units, unit })
    }

    /// Add two quantities of the same unit class.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        self.require_same_class(other)?;
        Ok(Self {
            base_units: self.base_units + other.base_units,
            unit: self.unit,
        })
    }

    /// Subtract two quantities of the same unit class (saturates at zero).
    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        self.require_same_class(other)?;
        Ok(Self {
            base_units: (self.base_units - other.base_units).max(0.0),
            unit: self.unit,
        })
    }

    /// Multiply by a dimensionless scalar (e.g. a request/limit multiplier).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            base_units: (self.base_units * factor).max(0.0),
            unit: self.unit,
        }
    }

    /// Ratio `self / other`, for utilization computations. Both operands
    /// must share a unit class.
    pub fn ratio(&self, other: &Self) -> Result<f64> {
        self.require_same_class(other)?;
        if other.base_units == 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(self.base_units / other.base_units)
    }

    pub fn clamp(&self, min: &Self, max: &Self) -> Result<Self> {
        self.require_same_class(min)?;
        self.require_same_class(max)?;
        Ok(Self {
            base_units: self.base_units.clamp(min.base_units, max.base_units),
            unit: self.unit,
        })
    }

    fn require_same_class(&self, other: &Self) -> Result<()> {
        if self.unit != other.unit {
            return Err(Error::UnitMismatch(format!(
                "cannot compare/combine {} with {}",
                self.unit, other.unit
            )));
        }
        Ok(())
    }
}

impl PartialEq for ResourceQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.unit == other.unit && self.base_units == other.base_units
    }
}

impl PartialOrd for ResourceQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.unit != other.unit {
            return None;
        }
        self.base_units.partial_cmp(&other.base_units)
    }
}

impl fmt::Display for ResourceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            UnitClass::Cpu => write!(f, "{}m", round_to_int(self.base_units)),
            UnitClass::Memory => write!(f, "{}", format_memory(self.base_units)),
        }
    }
}

fn round_to_int(v: f64) -> i64 {
    v.round() as i64
}

fn parse_cpu(s: &str) -> Result<f64> {
    if let Some(digits) = s.strip_suffix('m') {
        digits.parse::<f64>().map_err(|e| Error::InvalidQuantity {
            input: s.to_string(),
            reason: e.to_string(),
        })
    } else {
        let cores: f64 = s.parse().map_err(|e: std::num::ParseFloatError| Error::InvalidQuantity {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(cores * 1000.0)
    }
}

const BINARY_SUFFIXES: [(&str, f64); 6] = [
    ("Ei", 1024f64.powi(6)),
    ("Pi", 1024f64.powi(5)),
    ("Ti", 1024f64.powi(4)),
    ("Gi", 1024f64.powi(3)),
    ("Mi", 1024f64.powi(2)),
    ("Ki", 1024f64),
];

const DECIMAL_SUFFIXES: [(&str, f64); 6] = [
    ("E", 1000f64.powi(6)),
    ("P", 1000f64.powi(5)),
    ("T", 1000f64.powi(4)),
    ("G", 1000f64.powi(3)),
    ("M", 1000f64.powi(2)),
    ("k", 1000f64),
];

fn parse_memory(s: &str) -> Result<f64> {
    for (suffix, multiplier) in BINARY_SUFFIXES.iter() {
        if let Some(digits) = s.strip_suffix(suffix) {
            return digits
                .parse::<f64>()
                .map(|v| v * multiplier)
                .map_err(|e| Error::InvalidQuantity {
                    input: s.to_string(),
                    reason: e.to_string(),
                });
        }
    }
    for (suffix, multiplier) in DECIMAL_SUFFIXES.iter() {
        if let Some(digits) = s.strip_suffix(suffix) {
            return digits
                .parse::<f64>()
                .map(|v| v * multiplier)
                .map_err(|e| Error::InvalidQuantity {
                    input: s.to_string(),
                    reason: e.to_string(),
                });
        }
    }
    s.parse::<f64>().map_err(|e| Error::InvalidQuantity {
        input: s.to_string(),
        reason: e.to_string(),
    })
}

fn format_memory(bytes: f64) -> String {
    for (suffix, multiplier) in BINARY_SUFFIXES.iter() {
        if bytes >= *multiplier && (bytes / multiplier).fract().abs() < f64::EPSILON {
            return format!("{}{}", (bytes / multiplier) as i64, suffix);
        }
    }
    format!("{}", bytes as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cpu_millicores_and_cores() {
        assert_eq!(
            ResourceQuantity::parse("150m", UnitClass::Cpu).unwrap().base_units(),
            150.0
        );
        assert_eq!(
            ResourceQuantity::parse("1.5", UnitClass::Cpu).unwrap().base_units(),
            1500.0
        );
    }

    #[test]
    fn parses_memory_binary_suffixes() {
        assert_eq!(
            ResourceQuantity::parse("256Mi", UnitClass::Memory).unwrap().base_units(),
            256.0 * 1024.0 * 1024.0
        );
        assert_eq!(
            ResourceQuantity::parse("2Gi", UnitClass::Memory).unwrap().base_units(),
            2.0 * 1024f64.powi(3)
        );
    }

    #[test]
    fn round_trip_is_identity_up_to_canonical_form() {
        for input in ["150m", "256Mi", "2Gi", "1Ki"] {
            let unit = if input.ends_with("m") {
                UnitClass::Cpu
            } else {
                UnitClass::Memory
            };
            let q = ResourceQuantity::parse(input, unit).unwrap();
            let rendered = q.to_string();
            let reparsed = ResourceQuantity::parse(&rendered, unit).unwrap();
            assert_eq!(q.base_units(), reparsed.base_units());
            assert_eq!(reparsed.to_string(), rendered);
        }
    }

    #[test]
    fn cross_class_operations_are_errors() {
        let cpu = ResourceQuantity::cpu_millis(100.0);
        let mem = ResourceQuantity::memory_bytes(100.0);
        assert!(cpu.checked_add(&mem).is_err());
        assert!(cpu.partial_cmp(&mem).is_none());
    }

    #[test]
    fn negative_inputs_are_clamped_to_zero_on_construction() {
        assert_eq!(ResourceQuantity::cpu_millis(-5.0).base_units(), 0.0);
    }
}
