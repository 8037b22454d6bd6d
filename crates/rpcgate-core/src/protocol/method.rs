//! Fully-qualified method names (`/<service>/<method>`).

use std::fmt;

use crate::error::{GateError, Result};

/// A validated `/<service>/<method>` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodName {
    full: String,
    // byte index of the '/' separating service and method
    split: usize,
}

impl MethodName {
    /// Parse a full method name. Both segments must be non-empty and free of '/'.
    pub fn parse(full: &str) -> Result<Self> {
        let rest = full
            .strip_prefix('/')
            .ok_or_else(|| GateError::BadRequest(format!("method must start with '/': {full}")))?;
        let (service, method) = rest
            .split_once('/')
            .ok_or_else(|| GateError::BadRequest(format!("method must be /service/method: {full}")))?;
        if service.is_empty() || method.is_empty() || method.contains('/') {
            return Err(GateError::BadRequest(format!(
                "method must be /service/method: {full}"
            )));
        }
        Ok(Self {
            full: full.to_string(),
            split: service.len() + 1,
        })
    }

    /// Build from separate service and method segments.
    pub fn from_parts(service: &str, method: &str) -> Result<Self> {
        Self::parse(&format!("/{service}/{method}"))
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn service(&self) -> &str {
        &self.full[1..self.split]
    }

    pub fn method(&self) -> &str {
        &self.full[self.split + 1..]
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}
