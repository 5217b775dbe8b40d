//! Execution journal: per-rule counters and a bounded log of recent outcomes.

use crate::model::{OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub order_id: OrderId,
    pub rule: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleStats {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub last_failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalStats {
    pub total_rules: usize,
    pub total_executions: u64,
    pub failures: u64,
    /// Percentage of executions without any failure, 0 when nothing ran.
    pub success_rate: f64,
    /// Most frequent failure messages in the retained log, at most five.
    pub top_failure_reasons: Vec<(String, usize)>,
}

#[derive(Default)]
struct JournalState {
    rules: BTreeMap<String, RuleStats>,
    log: VecDeque<JournalEntry>,
}

pub struct AutomationJournal {
    capacity: usize,
    state: Mutex<JournalState>,
}

impl AutomationJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(JournalState::default()),
        }
    }

    pub fn record(&self, entry: JournalEntry) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let stats = state.rules.entry(entry.rule.clone()).or_default();
        stats.executions += 1;
        stats.last_executed_at = Some(entry.at);
        match entry.outcome {
            Outcome::Success => stats.successes += 1,
            Outcome::Failure => {
                stats.failures += 1;
                stats.last_failed_at = Some(entry.at);
            }
        }
        if state.log.len() == self.capacity {
            state.log.pop_front();
        }
        state.log.push_back(entry);
    }

    pub fn rule_stats(&self, rule: &str) -> Option<RuleStats> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.rules.get(rule).cloned()
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<JournalEntry> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.log.iter().rev().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> JournalStats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let total_executions: u64 = state.rules.values().map(|s| s.executions).sum();
        let failures: u64 = state.rules.values().map(|s| s.failures).sum();
        let success_rate = if total_executions == 0 {
            0.0
        } else {
            (total_executions - failures) as f64 / total_executions as f64 * 100.0
        };

        let mut reasons: HashMap<&str, usize> = HashMap::new();
        for entry in state.log.iter().filter(|e| e.outcome == Outcome::Failure) {
            *reasons.entry(entry.error.as_deref().unwrap_or("unknown error")).or_default() += 1;
        }
        let mut top_failure_reasons: Vec<(String, usize)> =
            reasons.into_iter().map(|(reason, count)| (reason.to_string(), count)).collect();
        top_failure_reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_failure_reasons.truncate(5);

        JournalStats {
            total_rules: state.rules.len(),
            total_executions,
            failures,
            success_rate,
            top_failure_reasons,
        }
    }
}

impl Default for AutomationJournal {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rule: &str, outcome: Outcome, error: Option<&str>) -> JournalEntry {
        JournalEntry {
            order_id: OrderId(1),
            rule: rule.into(),
            from: OrderStatus::Pending,
            to: OrderStatus::Processing,
            outcome,
            error: error.map(str::to_string),
            at: Utc::now(),
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn stats_aggregate_outcomes() {
        let journal = AutomationJournal::new(10);
        journal.record(entry("a", Outcome::Success, None));
        journal.record(entry("a", Outcome::Failure, Some("smtp down")));
        journal.record(entry("b", Outcome::Failure, Some("smtp down")));
        journal.record(entry("b", Outcome::Failure, Some("conflict")));

        let stats = journal.stats();
        assert_eq!(stats.total_rules, 2);
        assert_eq!(stats.total_executions, 4);
        assert_eq!(stats.failures, 3);
        assert_eq!(stats.success_rate, 25.0);
        assert_eq!(stats.top_failure_reasons[0], ("smtp down".to_string(), 2));

        let a = journal.rule_stats("a").unwrap();
        assert_eq!((a.executions, a.successes, a.failures), (2, 1, 1));
    }

    #[test]
    fn log_is_bounded() {
        let journal = AutomationJournal::new(2);
        journal.record(entry("first", Outcome::Success, None));
        journal.record(entry("second", Outcome::Success, None));
        journal.record(entry("third", Outcome::Success, None));

        let names: Vec<_> = journal.recent(10).into_iter().map(|e| e.rule).collect();
        assert_eq!(names, vec!["third", "second"]);
        // Counters outlive the log.
        assert_eq!(journal.stats().total_executions, 3);
    }
}
