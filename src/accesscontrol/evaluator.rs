use std::collections::HashMap;
use std::fmt;

use super::identity::Permissions;

/// A permission requirement tree checked against a user's grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluator {
    /// The action must be granted on any one of `scopes` (or on nothing, when empty)
    Permission { action: String, scopes: Vec<String> },
    All(Vec<Evaluator>),
    Any(Vec<Evaluator>),
}

impl Evaluator {
    pub fn permission(action: impl Into<String>, scopes: Vec<String>) -> Self {
        Evaluator::Permission {
            action: action.into(),
            scopes,
        }
    }

    pub fn evaluate(&self, permissions: &Permissions) -> bool {
        match self {
            Evaluator::Permission { action, scopes } => {
                let Some(granted) = permissions.get(action) else {
                    return false;
                };
                if scopes.is_empty() {
                    return true;
                }
                scopes
                    .iter()
                    .any(|target| granted.iter().any(|scope| scope_matches(scope, target)))
            }
            Evaluator::All(evaluators) => evaluators.iter().all(|e| e.evaluate(permissions)),
            Evaluator::Any(evaluators) => evaluators.iter().any(|e| e.evaluate(permissions)),
        }
    }

    /// Every scope referenced anywhere in the tree
    pub fn scopes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_scopes(&mut out);
        out
    }

    fn collect_scopes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Evaluator::Permission { scopes, .. } => out.extend(scopes.iter().map(String::as_str)),
            Evaluator::All(evaluators) | Evaluator::Any(evaluators) => {
                for e in evaluators {
                    e.collect_scopes(out);
                }
            }
        }
    }

    /// Copy of the tree with each scope replaced by its resolved set.
    /// Scopes missing from `resolved` are kept as they are.
    pub fn with_resolved_scopes(&self, resolved: &HashMap<String, Vec<String>>) -> Evaluator {
        match self {
            Evaluator::Permission { action, scopes } => {
                let mut expanded: Vec<String> = Vec::with_capacity(scopes.len());
                for scope in scopes {
                    match resolved.get(scope) {
                        Some(set) => {
                            for s in set {
                                if !expanded.contains(s) {
                                    expanded.push(s.clone());
                                }
                            }
                        }
                        None => {
                            if !expanded.contains(scope) {
                                expanded.push(scope.clone());
                            }
                        }
                    }
                }
                Evaluator::Permission {
                    action: action.clone(),
                    scopes: expanded,
                }
            }
            Evaluator::All(evaluators) => {
                Evaluator::All(evaluators.iter().map(|e| e.with_resolved_scopes(resolved)).collect())
            }
            Evaluator::Any(evaluators) => {
                Evaluator::Any(evaluators.iter().map(|e| e.with_resolved_scopes(resolved)).collect())
            }
        }
    }
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluator::Permission { action, scopes } => write!(f, "{}[{}]", action, scopes.join(",")),
            Evaluator::All(evaluators) | Evaluator::Any(evaluators) => {
                let op = if matches!(self, Evaluator::All(_)) { "all" } else { "any" };
                write!(f, "{}(", op)?;
                for (i, e) in evaluators.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// `granted` matches `target` exactly, or as a prefix when it ends in `*`
/// (`*`, `folders:*`, `folders:uid:*`).
pub fn scope_matches(granted: &str, target: &str) -> bool {
    if granted == target {
        return true;
    }
    match granted.strip_suffix('*') {
        Some(prefix) => target.starts_with(prefix),
        None => false,
    }
}
