//! Registry paths.
//!
//! A canonical path starts and ends with `/` and never contains empty
//! segments: `a//b` and `/a/b` both normalize to `/a/b/`. The root is `/`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Validate a single node name.
///
/// Names must be non-empty, must not contain `/` or control characters, and
/// must not be `.` or `..`.
pub fn validate_name(name: &str) -> RegistryResult<()> {
    let reason = if name.is_empty() {
        Some("name must not be empty")
    } else if name.contains('/') {
        Some("name must not contain '/'")
    } else if name.chars().any(char::is_control) {
        Some("name must not contain control characters")
    } else if name == "." || name == ".." {
        Some("name must not be '.' or '..'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }),
        None => Ok(()),
    }
}

/// Canonical, slash-terminated registry path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalize `path`, validating every segment.
    pub fn parse(path: &str) -> RegistryResult<Self> {
        let mut canonical = String::with_capacity(path.len() + 2);
        canonical.push('/');
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_name(segment)?;
            canonical.push_str(segment);
            canonical.push('/');
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The last segment; empty for the root.
    pub fn name(&self) -> &str {
        let trimmed = &self.0[..self.0.len() - 1];
        trimmed.rsplit('/').next().unwrap_or("")
    }

    /// The enclosing path; `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        let trimmed = &self.0[..self.0.len() - 1];
        let cut = trimmed.rfind('/').map_or(0, |i| i + 1);
        Some(Self(trimmed[..cut].to_string()))
    }

    pub fn child(&self, name: &str) -> RegistryResult<NodePath> {
        validate_name(name)?;
        Ok(Self(format!("{}{name}/", self.0)))
    }

    /// Whether `self` equals `ancestor` or lies below it.
    pub fn is_within(&self, ancestor: &NodePath) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    /// Number of segments; 0 for the root.
    pub fn depth(&self) -> usize {
        self.0.matches('/').count() - 1
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({})", self.0)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodePath {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
