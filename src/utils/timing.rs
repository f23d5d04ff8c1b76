//! Named wall-clock timers with a cross-rank summary.
//!
//! Timers accumulate across repeated calls under the same name and are reported in the order they
//! were first started. [`TimeMonitor::report`] is collective: every rank must hold the same timer
//! names, and the min/mean/max columns are reductions over ranks.

use crate::error::KError;
use crate::parallel::Comm;
use std::fmt::Write as _;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Output layout for [`TimeMonitor::report`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimeFormat {
    #[default]
    TableFixed,
    TableScientific,
    Yaml,
}

impl FromStr for TimeFormat {
    type Err = KError;
    fn from_str(s: &str) -> Result<Self, KError> {
        match s {
            "table-fixed" => Ok(TimeFormat::TableFixed),
            "table-scientific" => Ok(TimeFormat::TableScientific),
            "yaml" => Ok(TimeFormat::Yaml),
            other => Err(KError::invalid(
                "time-format",
                format!("`{other}` is not one of table-fixed, table-scientific, yaml"),
            )),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    total: Duration,
    calls: usize,
}

/// One timer row after reduction over ranks (seconds).
#[derive(Clone, Debug, PartialEq)]
pub struct TimerSummary {
    pub name: String,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub calls: usize,
}

#[derive(Clone, Debug, Default)]
pub struct TimeMonitor {
    entries: Vec<Entry>,
}

impl TimeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` and adds its wall time to the timer `name`.
    pub fn time<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.add(name, start.elapsed());
        out
    }

    pub fn add(&mut self, name: &str, elapsed: Duration) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(e) => {
                e.total += elapsed;
                e.calls += 1;
            }
            None => self.entries.push(Entry { name: name.to_string(), total: elapsed, calls: 1 }),
        }
    }

    pub fn elapsed(&self, name: &str) -> Option<Duration> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.total)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Min/mean/max of every timer over the ranks of `comm`. Collective.
    pub fn summarize(&self, comm: &dyn Comm) -> Vec<TimerSummary> {
        let p = comm.size() as f64;
        self.entries
            .iter()
            .map(|e| {
                let t = e.total.as_secs_f64();
                TimerSummary {
                    name: e.name.clone(),
                    min: comm.all_reduce_min(t),
                    mean: comm.all_reduce(t) / p,
                    max: comm.all_reduce_max(t),
                    calls: e.calls,
                }
            })
            .collect()
    }

    /// Formatted summary. Collective; every rank gets the same text.
    pub fn report(&self, comm: &dyn Comm, format: TimeFormat) -> String {
        let rows = self.summarize(comm);
        let mut out = String::new();
        match format {
            TimeFormat::Yaml => {
                let _ = writeln!(out, "Timing report:");
                let _ = writeln!(out, "  Number of processes: {}", comm.size());
                let _ = writeln!(out, "  Timers:");
                for r in &rows {
                    let _ = writeln!(out, "    \"{}\":", r.name);
                    let _ = writeln!(out, "      MinOverProcs: {:e}", r.min);
                    let _ = writeln!(out, "      MeanOverProcs: {:e}", r.mean);
                    let _ = writeln!(out, "      MaxOverProcs: {:e}", r.max);
                    let _ = writeln!(out, "      Calls: {}", r.calls);
                }
            }
            TimeFormat::TableFixed | TimeFormat::TableScientific => {
                let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(10);
                let _ = writeln!(
                    out,
                    "{:<width$}  {:>14}  {:>14}  {:>14}  {:>6}",
                    "Timer Name", "MinOverProcs", "MeanOverProcs", "MaxOverProcs", "Calls"
                );
                let _ = writeln!(out, "{}", "-".repeat(width + 2 + 3 * 16 + 6));
                for r in &rows {
                    let cell = |v: f64| match format {
                        TimeFormat::TableScientific => format!("{v:>14.4e}"),
                        _ => format!("{v:>14.6}"),
                    };
                    let _ = writeln!(
                        out,
                        "{:<width$}  {}  {}  {}  {:>6}",
                        r.name,
                        cell(r.min),
                        cell(r.mean),
                        cell(r.max),
                        r.calls
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;

    #[test]
    fn repeated_names_accumulate() {
        let mut tm = TimeMonitor::new();
        tm.add("Solve", Duration::from_millis(5));
        tm.add("Setup", Duration::from_millis(1));
        tm.add("Solve", Duration::from_millis(5));
        assert_eq!(tm.elapsed("Solve"), Some(Duration::from_millis(10)));
        assert_eq!(tm.names().collect::<Vec<_>>(), vec!["Solve", "Setup"]);
        let rows = tm.summarize(&SerialComm);
        assert_eq!(rows[0].calls, 2);
        assert_eq!(rows[0].min, rows[0].max);
    }

    #[test]
    fn formats_parse_and_render() {
        let mut tm = TimeMonitor::new();
        let v = tm.time("Read and Build Matrices", || 3);
        assert_eq!(v, 3);
        for f in ["table-fixed", "table-scientific", "yaml"] {
            let format: TimeFormat = f.parse().unwrap();
            assert!(tm.report(&SerialComm, format).contains("Read and Build Matrices"));
        }
        assert!("xml".parse::<TimeFormat>().is_err());
    }
}
