use crate::model::OrderStatus;
use crate::rules::StatusRule;
use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleTableError {
    #[error("Rule #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("Rule '{rule}' starts from terminal status {status}")]
    FromTerminal { rule: String, status: OrderStatus },

    #[error("Rule '{rule}' loops on {status}")]
    SelfLoop { rule: String, status: OrderStatus },

    #[error("Rule '{rule}' has a negative delay")]
    NegativeDelay { rule: String },

    #[error("Rule table contains a cycle: {path}")]
    Cycle { path: String },
}

/// Ordered, immutable list of status rules.
///
/// Construction rejects tables that could revisit an earlier status, since
/// status monotonicity across ticks relies on the table being acyclic.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<StatusRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<StatusRule>) -> Result<Self, RuleTableError> {
        for (index, rule) in rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(RuleTableError::EmptyName { index });
            }
            if rule.from.is_terminal() {
                return Err(RuleTableError::FromTerminal {
                    rule: rule.name.clone(),
                    status: rule.from,
                });
            }
            if rule.from == rule.to {
                return Err(RuleTableError::SelfLoop {
                    rule: rule.name.clone(),
                    status: rule.from,
                });
            }
            if rule.delay.is_some_and(|d| d < Duration::zero()) {
                return Err(RuleTableError::NegativeDelay { rule: rule.name.clone() });
            }
        }
        if let Some(path) = find_cycle(&rules) {
            return Err(RuleTableError::Cycle { path });
        }
        Ok(Self { rules })
    }

    /// The canonical order lifecycle.
    pub fn canonical(review_delay: Duration) -> Self {
        Self {
            rules: crate::rules::canonical_rules(review_delay),
        }
    }

    /// Rules leaving `from`, in declaration order.
    pub fn candidates(&self, from: OrderStatus) -> impl Iterator<Item = &StatusRule> + '_ {
        self.rules.iter().filter(move |r| r.from == from)
    }

    pub fn rules(&self) -> &[StatusRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Depth-first search over the from→to graph; returns the first cycle found.
fn find_cycle(rules: &[StatusRule]) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit(
        node: OrderStatus,
        rules: &[StatusRule],
        marks: &mut [Mark; OrderStatus::COUNT],
        stack: &mut Vec<OrderStatus>,
    ) -> Option<String> {
        marks[node.index()] = Mark::OnStack;
        stack.push(node);
        for rule in rules.iter().filter(|r| r.from == node) {
            match marks[rule.to.index()] {
                Mark::OnStack => {
                    let start = stack.iter().position(|s| *s == rule.to).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                    path.push(rule.to.to_string());
                    return Some(path.join(" -> "));
                }
                Mark::Unvisited => {
                    if let Some(path) = visit(rule.to, rules, marks, stack) {
                        return Some(path);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node.index()] = Mark::Done;
        None
    }

    let mut marks = [Mark::Unvisited; OrderStatus::COUNT];
    let mut stack = Vec::new();
    for status in OrderStatus::ALL {
        if marks[status.index()] == Mark::Unvisited {
            if let Some(path) = visit(status, rules, &mut marks, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}
