//! Host sensor sampling.
//!
//! CPU load comes from `sysinfo`'s global usage. Temperatures come from
//! `sysinfo` components, picked by label keywords. Labels look like
//! `coretemp Package id 0`, `k10temp Tctl` or `amdgpu edge`; the exact set
//! depends on the platform and drivers.
//!
//! The GPU source is chosen once at startup: a matching component if there
//! is one, otherwise `nvidia-smi` if it answers, otherwise nothing.

use std::process::Command;
use std::thread;

use log::{debug, info, warn};
use sysinfo::{Components, CpuRefreshKind, MINIMUM_CPU_UPDATE_INTERVAL, RefreshKind, System};

use crate::sample::Sample;

/// Component labels that identify a CPU temperature.
const CPU_KEYWORDS: [&str; 5] = ["coretemp", "k10temp", "cpu_thermal", "soc_thermal", "cpu"];

/// Within the CPU components, these name the whole-package reading.
const CPU_PACKAGE_KEYWORDS: [&str; 2] = ["package", "tctl"];

/// Component labels that identify a GPU temperature.
const GPU_KEYWORDS: [&str; 4] = ["nvidia", "amdgpu", "radeon", "gpu"];

const NVIDIA_SMI: &str = "nvidia-smi";
const NVIDIA_SMI_ARGS: [&str; 2] = ["--query-gpu=temperature.gpu", "--format=csv,noheader,nounits"];

fn matches_any(
    label: &str,
    keywords: &[&str],
) -> bool {
    keywords.iter().any(|k| label.contains(k))
}

fn is_gpu_label(label: &str) -> bool { matches_any(&label.to_lowercase(), &GPU_KEYWORDS) }

fn is_cpu_label(label: &str) -> bool {
    let label = label.to_lowercase();
    matches_any(&label, &CPU_KEYWORDS) && !matches_any(&label, &GPU_KEYWORDS)
}

/// Pick the CPU temperature from `(label, celsius)` readings.
///
/// A package reading wins; otherwise the hottest CPU reading is used.
/// Non-finite readings are ignored.
pub fn pick_cpu_temperature(readings: &[(String, f32)]) -> Option<f32> {
    let cpu = || {
        readings
            .iter()
            .filter(|(label, temp)| temp.is_finite() && is_cpu_label(label))
    };
    cpu()
        .find(|(label, _)| matches_any(&label.to_lowercase(), &CPU_PACKAGE_KEYWORDS))
        .map(|&(_, temp)| temp)
        .or_else(|| cpu().map(|&(_, temp)| temp).reduce(f32::max))
}

/// Pick the GPU temperature from `(label, celsius)` readings: the hottest
/// GPU component.
pub fn pick_gpu_temperature(readings: &[(String, f32)]) -> Option<f32> {
    readings
        .iter()
        .filter(|(label, temp)| temp.is_finite() && is_gpu_label(label))
        .map(|&(_, temp)| temp)
        .reduce(f32::max)
}

/// First line of `nvidia-smi --query-gpu=temperature.gpu` output.
pub fn parse_nvidia_smi(stdout: &str) -> Option<f32> {
    stdout.lines().next()?.trim().parse().ok()
}

fn query_nvidia_smi() -> Option<f32> {
    let output = Command::new(NVIDIA_SMI).args(NVIDIA_SMI_ARGS).output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
}

/// Where GPU temperatures come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GpuSource {
    Components,
    NvidiaSmi,
    Unavailable,
}

/// Long-lived sampler; keeps `sysinfo` state between rounds so CPU usage is
/// measured over the sampling interval.
pub struct Sampler {
    system: System,
    components: Components,
    gpu_source: GpuSource,
}

impl Sampler {
    pub fn new() -> Self {
        let mut system = System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new().with_cpu_usage()));
        // Usage is a delta between two refreshes; prime the first one.
        thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();

        let components = Components::new_with_refreshed_list();
        let readings = Self::readings(&components);
        for (label, temp) in &readings {
            debug!("Component {label:?}: {temp:.1} C");
        }

        match pick_cpu_temperature(&readings) {
            Some(_) => info!("CPU temperature sensor found"),
            None => warn!("No CPU temperature sensor found; sending {}", crate::sample::MISSING),
        }

        let gpu_source = if pick_gpu_temperature(&readings).is_some() {
            info!("Using sensor components for GPU temperature");
            GpuSource::Components
        } else if query_nvidia_smi().is_some() {
            info!("Using {NVIDIA_SMI} for GPU temperature");
            GpuSource::NvidiaSmi
        } else {
            warn!("No GPU thermal sensor found");
            GpuSource::Unavailable
        };

        Self {
            system,
            components,
            gpu_source,
        }
    }

    fn readings(components: &Components) -> Vec<(String, f32)> {
        components
            .iter()
            .map(|c| (c.label().to_string(), c.temperature()))
            .collect()
    }

    /// Take one round of measurements.
    pub fn sample(&mut self) -> Sample {
        self.system.refresh_cpu_usage();
        self.components.refresh();
        let readings = Self::readings(&self.components);

        let gpu_temp = match self.gpu_source {
            GpuSource::Components => pick_gpu_temperature(&readings),
            GpuSource::NvidiaSmi => query_nvidia_smi(),
            GpuSource::Unavailable => None,
        };

        Sample {
            cpu_temp: pick_cpu_temperature(&readings),
            cpu_load: Some(self.system.global_cpu_usage()),
            gpu_temp,
        }
    }
}
