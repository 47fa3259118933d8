//! One round of host measurements and its wire form.

use std::fmt;

/// Text sent for a reading the host could not take.
pub const MISSING: &str = "N/A";

/// CPU temperature, CPU load and GPU temperature. `None` means the sensor
/// was not found or failed this round.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    pub cpu_temp: Option<f32>,
    pub cpu_load: Option<f32>,
    pub gpu_temp: Option<f32>,
}

struct Field(Option<f32>);

impl fmt::Display for Field {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        // One decimal; the strip keeps the integer part (45.7 shows as 45).
        match self.0 {
            Some(v) if v.is_finite() => write!(f, "{v:.1}"),
            _ => f.write_str(MISSING),
        }
    }
}

/// Wire form without terminator: `45.7,30.2,N/A`.
impl fmt::Display for Sample {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{},{},{}", Field(self.cpu_temp), Field(self.cpu_load), Field(self.gpu_temp))
    }
}

#[cfg(test)]
mod tests {
    use pcstats_gauges::{StatsFrame, parse_line};

    use super::*;

    #[test]
    fn test_one_decimal_place() {
        let sample = Sample {
            cpu_temp: Some(45.7),
            cpu_load: Some(30.24),
            gpu_temp: Some(52.0),
        };
        assert_eq!(sample.to_string(), "45.7,30.2,52.0");
    }

    #[test]
    fn test_missing_fields() {
        let sample = Sample {
            cpu_temp: Some(61.0),
            cpu_load: None,
            gpu_temp: Some(f32::NAN),
        };
        assert_eq!(sample.to_string(), "61.0,N/A,N/A", "NaN counts as missing");
        assert_eq!(Sample::default().to_string(), "N/A,N/A,N/A");
    }

    #[test]
    fn test_negative_readings() {
        let sample = Sample {
            cpu_temp: Some(-0.4),
            cpu_load: Some(0.0),
            gpu_temp: Some(-3.6),
        };
        assert_eq!(sample.to_string(), "-0.4,0.0,-3.6");
        assert_eq!(
            parse_line(&sample.to_string()),
            Some(StatsFrame {
                cpu_temp: 0,
                cpu_load: 0,
                gpu_temp: -3
            })
        );
    }

    #[test]
    fn test_wire_form_is_accepted_by_display() {
        let sample = Sample {
            cpu_temp: Some(72.3),
            cpu_load: None,
            gpu_temp: Some(48.9),
        };
        let line = format!("{sample}\n");
        assert_eq!(
            parse_line(&line),
            Some(StatsFrame {
                cpu_temp: 72,
                cpu_load: 0,
                gpu_temp: 48
            }),
            "strip keeps the integer part; missing fields read as 0"
        );
        assert_eq!(parse_line(&Sample::default().to_string()).map(|f| f.cpu_temp), Some(0));
    }
}
