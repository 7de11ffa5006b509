// Named-scope elapsed-time accumulation for native calls.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScopeTotal {
    pub elapsed: Duration,
    pub calls: u64,
}

#[derive(Clone, Debug)]
pub struct Timer {
    name: String,
    running: HashMap<String, Instant>,
    totals: HashMap<String, ScopeTotal>,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: HashMap::new(),
            totals: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&mut self, scope: &str) -> Result<(), Error> {
        if self.running.contains_key(scope) {
            return Err(Error::new(ErrorKind::Timer)
                .with_message(format!("timer for {scope} is already running")));
        }
        self.running.insert(scope.to_string(), Instant::now());
        Ok(())
    }

    pub fn stop(&mut self, scope: &str) -> Result<Duration, Error> {
        let started = self.running.remove(scope).ok_or_else(|| {
            Error::new(ErrorKind::Timer).with_message(format!("timer for {scope} is not running"))
        })?;
        let elapsed = started.elapsed();
        tracing::debug!(
            "elapsed time for {}.{}: {:.4} seconds",
            self.name,
            scope,
            elapsed.as_secs_f64()
        );
        let total = self.totals.entry(scope.to_string()).or_default();
        total.elapsed += elapsed;
        total.calls += 1;
        Ok(elapsed)
    }

    pub fn is_running(&self, scope: &str) -> bool {
        self.running.contains_key(scope)
    }

    pub fn total(&self, scope: &str) -> Duration {
        self.totals
            .get(scope)
            .map(|total| total.elapsed)
            .unwrap_or_default()
    }

    pub fn count(&self, scope: &str) -> u64 {
        self.totals.get(scope).map(|total| total.calls).unwrap_or(0)
    }

    /// Per-scope totals, fastest first.
    pub fn totals(&self) -> Vec<(&str, ScopeTotal)> {
        let mut totals: Vec<_> = self
            .totals
            .iter()
            .map(|(scope, total)| (scope.as_str(), *total))
            .collect();
        totals.sort_by(|a, b| a.1.elapsed.cmp(&b.1.elapsed).then(a.0.cmp(b.0)));
        totals
    }

    /// Log every scope total and return their sum.
    pub fn report_totals(&self) -> Duration {
        let mut sum = Duration::ZERO;
        for (scope, total) in self.totals() {
            tracing::info!(
                "total elapsed time for {}.{}: {:.4} seconds ({} calls)",
                self.name,
                scope,
                total.elapsed.as_secs_f64(),
                total.calls
            );
            sum += total.elapsed;
        }
        sum
    }
}
