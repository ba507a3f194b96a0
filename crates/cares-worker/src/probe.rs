//! Host resource probes.
//!
//! The heartbeat loop only needs two percentages; where they come from
//! is a collaborator concern behind [`ResourceProbe`]. On Linux the
//! production probe samples procfs directly; tests and other platforms
//! use [`FixedProbe`].

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Result, WorkerError};

/// One resource sample, both values in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// CPU usage percentage.
    pub cpu_percent: f64,
    /// Memory usage percentage.
    pub memory_percent: f64,
}

/// Produces host resource usage percentages.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Takes one sample.
    async fn sample(&self) -> Result<ResourceSample>;
}

/// Probe returning constant values.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe {
    cpu_percent: f64,
    memory_percent: f64,
}

impl FixedProbe {
    /// Creates a probe that always reports the given percentages.
    #[must_use]
    pub fn new(cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            cpu_percent,
            memory_percent,
        }
    }

    /// Creates a probe reporting an idle host.
    #[must_use]
    pub fn idle() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[async_trait]
impl ResourceProbe for FixedProbe {
    async fn sample(&self) -> Result<ResourceSample> {
        Ok(ResourceSample {
            cpu_percent: self.cpu_percent,
            memory_percent: self.memory_percent,
        })
    }
}

/// Probe reading `/proc/stat` and `/proc/meminfo`.
///
/// CPU usage is derived from the delta of two `/proc/stat` readings
/// taken `sample_window` apart; memory usage comes from
/// `MemTotal`/`MemAvailable`.
#[derive(Debug, Clone)]
pub struct ProcProbe {
    sample_window: Duration,
}

impl ProcProbe {
    /// Creates a probe with the default 250 ms CPU sampling window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sample_window: Duration::from_millis(250),
        }
    }
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProbe for ProcProbe {
    async fn sample(&self) -> Result<ResourceSample> {
        let first = read_cpu_times().await?;
        tokio::time::sleep(self.sample_window).await;
        let second = read_cpu_times().await?;

        let cpu_percent = cpu_percent_between(first, second);
        let memory_percent = read_memory_percent().await?;

        Ok(ResourceSample {
            cpu_percent: cpu_percent.clamp(0.0, 100.0),
            memory_percent: memory_percent.clamp(0.0, 100.0),
        })
    }
}

/// Aggregate CPU times from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

async fn read_cpu_times() -> Result<CpuTimes> {
    let stat = tokio::fs::read_to_string("/proc/stat")
        .await
        .map_err(|e| WorkerError::Probe(format!("failed to read /proc/stat: {e}")))?;
    parse_cpu_times(&stat)
}

fn parse_cpu_times(stat: &str) -> Result<CpuTimes> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| WorkerError::Probe("no aggregate cpu line in /proc/stat".to_owned()))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map_while(|f| f.parse().ok())
        .collect();

    if fields.len() < 5 {
        return Err(WorkerError::Probe(format!(
            "malformed cpu line in /proc/stat: '{line}'"
        )));
    }

    // user nice system idle iowait [irq softirq steal ...]
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total = fields.iter().sum();

    Ok(CpuTimes { idle, total })
}

fn cpu_percent_between(first: CpuTimes, second: CpuTimes) -> f64 {
    let total_delta = second.total.saturating_sub(first.total);
    if total_delta == 0 {
        return 0.0;
    }
    let idle_delta = second.idle.saturating_sub(first.idle);
    let busy_delta = total_delta.saturating_sub(idle_delta);

    busy_delta as f64 / total_delta as f64 * 100.0
}

async fn read_memory_percent() -> Result<f64> {
    let meminfo = tokio::fs::read_to_string("/proc/meminfo")
        .await
        .map_err(|e| WorkerError::Probe(format!("failed to read /proc/meminfo: {e}")))?;
    parse_memory_percent(&meminfo)
}

fn parse_memory_percent(meminfo: &str) -> Result<f64> {
    let field = |name: &str| -> Result<f64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| WorkerError::Probe(format!("missing {name} in /proc/meminfo")))
    };

    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;

    if total <= 0.0 {
        return Err(WorkerError::Probe("MemTotal is zero".to_owned()));
    }

    Ok((1.0 - available / total) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_probe_reports_constants() {
        let probe = FixedProbe::new(42.0, 58.0);
        let sample = probe.sample().await.unwrap();
        assert_eq!(sample.cpu_percent, 42.0);
        assert_eq!(sample.memory_percent, 58.0);
    }

    #[test]
    fn parse_cpu_line() {
        let stat = "cpu  100 0 50 800 50 0 0 0 0 0\ncpu0 50 0 25 400 25 0 0 0 0 0\n";
        let times = parse_cpu_times(stat).unwrap();
        assert_eq!(times.idle, 850);
        assert_eq!(times.total, 1000);
    }

    #[test]
    fn parse_cpu_rejects_garbage() {
        assert!(parse_cpu_times("intr 12345\n").is_err());
        assert!(parse_cpu_times("cpu  1 2\n").is_err());
    }

    #[test]
    fn cpu_percent_from_deltas() {
        let first = CpuTimes {
            idle: 800,
            total: 1000,
        };
        let second = CpuTimes {
            idle: 850,
            total: 1100,
        };
        // 100 total ticks, 50 idle, 50 busy.
        let percent = cpu_percent_between(first, second);
        assert!((percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cpu_percent_zero_delta_is_zero() {
        let times = CpuTimes {
            idle: 10,
            total: 100,
        };
        assert_eq!(cpu_percent_between(times, times), 0.0);
    }

    #[test]
    fn parse_meminfo_percent() {
        let meminfo = "MemTotal:       16000000 kB\nMemFree:         2000000 kB\nMemAvailable:    4000000 kB\n";
        let percent = parse_memory_percent(meminfo).unwrap();
        assert!((percent - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_meminfo_missing_field() {
        assert!(parse_memory_percent("MemTotal: 1000 kB\n").is_err());
    }
}
