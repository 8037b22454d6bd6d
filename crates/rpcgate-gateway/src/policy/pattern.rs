//! Method pattern compilation and matching.
//!
//! A pattern has the shape of a full method name, `/<service>/<method>`.
//! Within a segment `*` matches any run of characters except `/`, so
//! `/main.Biz/*` covers every method of `main.Biz` and `/main.Biz/Get*`
//! covers the getters. There is no regex syntax: every other character is
//! literal.

use rpcgate_core::error::{GateError, Result};

/// Compiled method pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPattern {
    raw: String,
    service: Segment,
    method: Segment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Any,
    Literal(String),
    Glob(String),
}

impl Segment {
    fn compile(s: &str) -> Self {
        if s.chars().all(|c| c == '*') {
            Segment::Any
        } else if s.contains('*') {
            Segment::Glob(s.to_string())
        } else {
            Segment::Literal(s.to_string())
        }
    }

    fn matches(&self, s: &str) -> bool {
        match self {
            Segment::Any => true,
            Segment::Literal(l) => l == s,
            Segment::Glob(g) => glob_match(g.as_bytes(), s.as_bytes()),
        }
    }
}

impl MethodPattern {
    pub fn compile(raw: &str) -> Result<Self> {
        let invalid = || GateError::BadRequest(format!("invalid method pattern: {raw} (expected /service/method)"));

        let rest = raw.strip_prefix('/').ok_or_else(invalid)?;
        let (service, method) = rest.split_once('/').ok_or_else(invalid)?;
        if service.is_empty() || method.is_empty() || method.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            raw: raw.to_string(),
            service: Segment::compile(service),
            method: Segment::compile(method),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a full method name. Names that are not `/service/method` never match.
    pub fn matches(&self, full_method: &str) -> bool {
        let Some((service, method)) = full_method
            .strip_prefix('/')
            .and_then(|rest| rest.split_once('/'))
        else {
            return false;
        };
        if method.contains('/') {
            return false;
        }
        self.service.matches(service) && self.method.matches(method)
    }
}

pub fn compile_patterns(raw: &[String]) -> Result<Vec<MethodPattern>> {
    raw.iter().map(|s| MethodPattern::compile(s)).collect()
}

// Iterative wildcard match with single-star backtracking.
fn glob_match(pat: &[u8], s: &[u8]) -> bool {
    let (mut p, mut i) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while i < s.len() {
        if p < pat.len() && pat[p] == b'*' {
            star = Some((p, i));
            p += 1;
        } else if p < pat.len() && pat[p] == s[i] {
            p += 1;
            i += 1;
        } else if let Some((sp, si)) = star {
            p = sp + 1;
            i = si + 1;
            star = Some((sp, si + 1));
        } else {
            return false;
        }
    }
    pat[p..].iter().all(|c| *c == b'*')
}
