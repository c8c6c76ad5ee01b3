//! 名前付きタイマー

use crate::TableauError;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Timer guarding the whole completion run
pub const COMPLETE: &str = "complete";

#[derive(Debug, Clone, Default)]
pub struct Timer {
    started: Option<Instant>,
    total: Duration,
    count: u64,
    limit: Option<Duration>,
}

impl Timer {
    pub fn elapsed(&self) -> Duration {
        self.started.map(|start| start.elapsed()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.total + self.elapsed()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }
}

/// Named timers with optional limits, polled synchronously
#[derive(Debug, Clone, Default)]
pub struct Timers {
    timers: BTreeMap<String, Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_limit(&mut self, name: &str, limit: Option<Duration>) {
        self.timers.entry(name.to_string()).or_default().limit = limit;
    }

    pub fn start(&mut self, name: &str) {
        let timer = self.timers.entry(name.to_string()).or_default();
        if timer.started.is_none() {
            timer.started = Some(Instant::now());
            timer.count += 1;
        }
    }

    pub fn stop(&mut self, name: &str) -> Duration {
        match self.timers.get_mut(name) {
            Some(timer) => {
                let elapsed = timer.elapsed();
                timer.total += elapsed;
                timer.started = None;
                elapsed
            }
            None => Duration::ZERO,
        }
    }

    /// Fail with a timeout if a running timer is past its limit
    pub fn check(&self, name: &str) -> Result<(), TableauError> {
        let Some(timer) = self.timers.get(name) else {
            return Ok(());
        };
        match (timer.started, timer.limit) {
            (Some(_), Some(limit)) if timer.elapsed() >= limit => Err(TableauError::Timeout {
                timer: name.to_string(),
                elapsed_ms: timer.elapsed().as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Timer> {
        self.timers.get(name)
    }

    /// Totals per timer, in name order
    pub fn report(&self) -> Vec<(String, Duration)> {
        self.timers
            .iter()
            .map(|(name, timer)| (name.clone(), timer.total()))
            .collect()
    }
}
