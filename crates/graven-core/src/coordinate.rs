//! Package coordinates and their version-less logical identity.

use std::fmt;

use graven_util::errors::GravenError;

/// A package at a concrete version: `group:name[:classifier]:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub group: String,
    pub name: String,
    pub classifier: Option<String>,
    pub version: String,
}

/// The identity used for conflict grouping: a coordinate without its version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalId {
    pub group: String,
    pub name: String,
    pub classifier: Option<String>,
}

impl Coordinate {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            classifier: None,
            version: version.into(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Parse `group:name:version` or `group:name:classifier:version`.
    pub fn parse(s: &str) -> Result<Self, GravenError> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let coord = match parts.as_slice() {
            [group, name, version] => Self::new(*group, *name, *version),
            [group, name, classifier, version] => {
                Self::new(*group, *name, *version).with_classifier(*classifier)
            }
            _ => {
                return Err(GravenError::Coordinate {
                    input: s.to_string(),
                    reason: format!("expected 3 or 4 segments, found {}", parts.len()),
                })
            }
        };
        coord.validate().map_err(|reason| GravenError::Coordinate {
            input: s.to_string(),
            reason,
        })?;
        Ok(coord)
    }

    /// Check that every segment is non-empty and free of separators.
    pub fn validate(&self) -> Result<(), String> {
        validate_segment("group", &self.group)?;
        validate_segment("name", &self.name)?;
        if let Some(ref classifier) = self.classifier {
            validate_segment("classifier", classifier)?;
        }
        validate_segment("version", &self.version)
    }

    pub fn logical_id(&self) -> LogicalId {
        LogicalId {
            group: self.group.clone(),
            name: self.name.clone(),
            classifier: self.classifier.clone(),
        }
    }

    /// The same package at another version.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }
}

pub(crate) fn validate_segment(label: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{label} is empty"));
    }
    if value.contains(':') || value.chars().any(char::is_whitespace) {
        return Err(format!("{label} `{value}` contains ':' or whitespace"));
    }
    Ok(())
}

impl LogicalId {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            classifier: None,
        }
    }

    pub fn at(&self, version: impl Into<String>) -> Coordinate {
        Coordinate {
            group: self.group.clone(),
            name: self.name.clone(),
            classifier: self.classifier.clone(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classifier {
            Some(ref c) => write!(f, "{}:{}:{}:{}", self.group, self.name, c, self.version),
            None => write!(f, "{}:{}:{}", self.group, self.name, self.version),
        }
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classifier {
            Some(ref c) => write!(f, "{}:{}:{}", self.group, self.name, c),
            None => write!(f, "{}:{}", self.group, self.name),
        }
    }
}
