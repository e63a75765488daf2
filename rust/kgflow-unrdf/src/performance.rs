//! Latency tracking for hook and condition execution.
//!
//! Keeps a bounded sample window per operation and answers percentile and
//! SLO-compliance queries.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Per-operation latency summary
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStats {
    pub operation: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p99: f64,
    pub p999: f64,
}

/// SLO compliance for one operation
#[derive(Debug, Clone, PartialEq)]
pub struct SloStatus {
    pub operation: String,
    pub target_ms: f64,
    pub compliant_count: usize,
    pub total_count: usize,
    pub compliance_rate: f64,
}

/// Bounded-window latency tracker
pub struct PerformanceTracker {
    samples: Mutex<HashMap<String, Vec<f64>>>,
    sample_size: usize,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PerformanceTracker {
    pub fn new(sample_size: usize) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            sample_size: sample_size.max(1),
        }
    }

    pub fn record_latency(&self, operation: &str, latency_ms: f64) {
        let mut samples = self.samples.lock();
        let window = samples.entry(operation.to_string()).or_default();
        window.push(latency_ms);
        if window.len() > self.sample_size {
            window.remove(0);
        }
    }

    pub fn percentile(&self, operation: &str, percentile: f64) -> Option<f64> {
        let samples = self.samples.lock();
        let window = samples.get(operation)?;
        if window.is_empty() {
            return None;
        }
        let mut sorted = window.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((sorted.len() as f64 * percentile) as usize).min(sorted.len() - 1);
        Some(sorted[idx])
    }

    pub fn stats(&self, operation: &str) -> Option<OperationStats> {
        let (count, min, max, mean) = {
            let samples = self.samples.lock();
            let window = samples.get(operation)?;
            if window.is_empty() {
                return None;
            }
            let count = window.len();
            let min = window.iter().copied().fold(f64::INFINITY, f64::min);
            let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = window.iter().sum::<f64>() / count as f64;
            (count, min, max, mean)
        };
        Some(OperationStats {
            operation: operation.to_string(),
            count,
            min,
            max,
            mean,
            p50: self.percentile(operation, 0.50).unwrap_or(0.0),
            p99: self.percentile(operation, 0.99).unwrap_or(0.0),
            p999: self.percentile(operation, 0.999).unwrap_or(0.0),
        })
    }

    pub fn slo_status(&self, operation: &str, target_ms: f64) -> Option<SloStatus> {
        let samples = self.samples.lock();
        let window = samples.get(operation)?;
        if window.is_empty() {
            return None;
        }
        let compliant = window.iter().filter(|l| **l <= target_ms).count();
        Some(SloStatus {
            operation: operation.to_string(),
            target_ms,
            compliant_count: compliant,
            total_count: window.len(),
            compliance_rate: compliant as f64 / window.len() as f64,
        })
    }

    pub fn operations(&self) -> Vec<String> {
        self.samples.lock().keys().cloned().collect()
    }
}
