//! Per-stage timers for local and global processing.
//!
//! Timers only observe; nothing in the pipeline reads them back.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type TimerHandle = Arc<Mutex<StageTimer>>;

#[derive(Debug, Clone, Default)]
struct StageStats {
    total: Duration,
    count: u32,
    max: Duration,
}

#[derive(Debug)]
pub struct StageTimer {
    label: String,
    order: Vec<String>,
    stats: HashMap<String, StageStats>,
    open: HashMap<String, Instant>,
}

impl StageTimer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            order: Vec::new(),
            stats: HashMap::new(),
            open: HashMap::new(),
        }
    }

    pub fn handle(label: impl Into<String>) -> TimerHandle {
        Arc::new(Mutex::new(Self::new(label)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn start_event(&mut self, stage: &str) {
        self.open.insert(stage.to_string(), Instant::now());
    }

    /// Close a stage opened with [`start_event`](Self::start_event).
    /// Unmatched ends are ignored.
    pub fn end_event(&mut self, stage: &str) {
        if let Some(start) = self.open.remove(stage) {
            self.record(stage, start.elapsed());
        }
    }

    pub fn record(&mut self, stage: &str, elapsed: Duration) {
        if !self.stats.contains_key(stage) {
            self.order.push(stage.to_string());
        }
        let stats = self.stats.entry(stage.to_string()).or_default();
        stats.total += elapsed;
        stats.count += 1;
        stats.max = stats.max.max(elapsed);
    }

    pub fn report(&self) -> TimingReport {
        let stages = self
            .order
            .iter()
            .filter_map(|name| {
                self.stats.get(name).map(|s| StageSummary {
                    name: name.clone(),
                    count: s.count,
                    total: s.total,
                    max: s.max,
                })
            })
            .collect();
        TimingReport {
            label: self.label.clone(),
            stages,
        }
    }

    pub fn reset(&mut self) {
        self.order.clear();
        self.stats.clear();
        self.open.clear();
    }
}

/// Run `f` as stage `stage` on an optional timer.
pub fn timed<R>(timer: Option<&TimerHandle>, stage: &str, f: impl FnOnce() -> R) -> R {
    let Some(timer) = timer else {
        return f();
    };
    let start = Instant::now();
    let out = f();
    timer.lock().record(stage, start.elapsed());
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub name: String,
    pub count: u32,
    pub total: Duration,
    pub max: Duration,
}

impl StageSummary {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingReport {
    pub label: String,
    pub stages: Vec<StageSummary>,
}

impl TimingReport {
    pub fn stage(&self, name: &str) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.name == name)
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.label)?;
        for s in &self.stages {
            writeln!(
                f,
                "  {:<24} n={:<6} total={:>10.3}ms mean={:>8.3}ms max={:>8.3}ms",
                s.name,
                s.count,
                s.total.as_secs_f64() * 1e3,
                s.mean().as_secs_f64() * 1e3,
                s.max.as_secs_f64() * 1e3,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_keep_insertion_order() {
        let mut timer = StageTimer::new("LOCAL");
        timer.record("match", Duration::from_millis(2));
        timer.record("detect", Duration::from_millis(1));
        timer.record("match", Duration::from_millis(4));

        let report = timer.report();
        assert_eq!(report.label, "LOCAL");
        let names: Vec<_> = report.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["match", "detect"]);

        let m = report.stage("match").unwrap();
        assert_eq!(m.count, 2);
        assert_eq!(m.total, Duration::from_millis(6));
        assert_eq!(m.mean(), Duration::from_millis(3));
        assert_eq!(m.max, Duration::from_millis(4));
    }

    #[test]
    fn start_end_pairs_are_recorded() {
        let mut timer = StageTimer::new("GLOBAL");
        timer.start_event("solve");
        timer.end_event("solve");
        timer.end_event("never_started");
        let report = timer.report();
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.stage("solve").unwrap().count, 1);
    }

    #[test]
    fn timed_without_timer_still_runs() {
        assert_eq!(timed(None, "noop", || 7), 7);
        let handle = StageTimer::handle("LOCAL");
        assert_eq!(timed(Some(&handle), "add", || 1 + 1), 2);
        assert_eq!(handle.lock().report().stage("add").unwrap().count, 1);
    }

    #[test]
    fn display_lists_every_stage() {
        let mut timer = StageTimer::new("LOCAL");
        timer.record("a", Duration::from_micros(10));
        timer.record("b", Duration::from_micros(20));
        let text = timer.report().to_string();
        assert!(text.starts_with("LOCAL"));
        assert!(text.contains("  a"));
        assert!(text.contains("  b"));
    }
}
