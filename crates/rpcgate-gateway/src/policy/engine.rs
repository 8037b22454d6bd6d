use std::collections::HashMap;

use rpcgate_core::error::{GateError, Result};

use super::pattern::{compile_patterns, MethodPattern};

/// Why a call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Empty consumer or one the table does not know.
    UnknownConsumer,
    /// Known consumer, no pattern matched the method.
    MethodNotAllowed,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::UnknownConsumer => "unknown consumer",
            DenyReason::MethodNotAllowed => "method not allowed for consumer",
        }
    }

    pub fn into_error(self) -> GateError {
        match self {
            DenyReason::UnknownConsumer => GateError::Unauthenticated(self.as_str().into()),
            DenyReason::MethodNotAllowed => GateError::PermissionDenied(self.as_str().into()),
        }
    }
}

/// Decision from policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Index of the first pattern that matched.
    Allow { rule: usize },
    Deny(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allow { .. })
    }
}

/// Consumer -> ordered method patterns.
/// Construct once at startup, then share via Arc.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: HashMap<String, Vec<MethodPattern>>,
}

impl AccessPolicy {
    /// Compile every pattern of the table. Any malformed pattern fails the
    /// whole policy with the consumer it belongs to.
    pub fn new(table: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut rules = HashMap::with_capacity(table.len());
        for (consumer, raw) in table {
            let compiled = compile_patterns(raw).map_err(|e| {
                GateError::BadRequest(format!("acl compile failed (consumer={consumer}): {e}"))
            })?;
            rules.insert(consumer.clone(), compiled);
        }
        Ok(Self { rules })
    }

    /// Parse a JSON object of `consumer -> [pattern, ...]` and compile it.
    pub fn from_json(s: &str) -> Result<Self> {
        let table: HashMap<String, Vec<String>> = serde_json::from_str(s)
            .map_err(|e| GateError::BadRequest(format!("invalid acl json: {e}")))?;
        Self::new(&table)
    }

    /// First matching pattern wins; the empty consumer is always unknown.
    pub fn authorize(&self, consumer: &str, full_method: &str) -> PolicyDecision {
        if consumer.is_empty() {
            return PolicyDecision::Deny(DenyReason::UnknownConsumer);
        }
        let Some(patterns) = self.rules.get(consumer) else {
            return PolicyDecision::Deny(DenyReason::UnknownConsumer);
        };
        patterns
            .iter()
            .position(|p| p.matches(full_method))
            .map(|rule| PolicyDecision::Allow { rule })
            .unwrap_or(PolicyDecision::Deny(DenyReason::MethodNotAllowed))
    }

    /// `authorize` as a `Result` for interceptors.
    pub fn check(&self, consumer: &str, full_method: &str) -> Result<()> {
        match self.authorize(consumer, full_method) {
            PolicyDecision::Allow { .. } => Ok(()),
            PolicyDecision::Deny(reason) => Err(reason.into_error()),
        }
    }

    pub fn consumers(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn patterns(&self, consumer: &str) -> &[MethodPattern] {
        self.rules.get(consumer).map(Vec::as_slice).unwrap_or_default()
    }
}
