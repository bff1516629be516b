use std::fmt;
use std::hash::{Hash, Hasher};

use graven_util::errors::GravenError;

use crate::coordinate::{validate_segment, Coordinate, LogicalId};
use crate::scope::Scope;
use crate::version::{MavenVersion, VersionRange};

/// A version requirement on a dependency edge.
#[derive(Debug, Clone)]
pub enum VersionConstraint {
    /// A bare version such as `1.5`: a recommendation the conflict resolver
    /// may override.
    Soft(MavenVersion),
    /// One or more ranges such as `[1.0,2.0)`: every selected version must
    /// satisfy them.
    Hard(Vec<VersionRange>),
    /// Whatever the newest published version is.
    Latest,
}

impl VersionConstraint {
    pub fn parse(spec: &str) -> Result<Self, GravenError> {
        let s = spec.trim();
        if s.is_empty() {
            return Err(GravenError::Generic {
                message: "empty version constraint".to_string(),
            });
        }
        if s.eq_ignore_ascii_case("latest") || s.eq_ignore_ascii_case("release") {
            return Ok(Self::Latest);
        }
        if s.starts_with('[') || s.starts_with('(') {
            return VersionRange::parse_union(s)
                .map(Self::Hard)
                .ok_or_else(|| GravenError::Generic {
                    message: format!("malformed version range `{s}`"),
                });
        }
        validate_segment("version", s).map_err(|message| GravenError::Generic { message })?;
        Ok(Self::Soft(MavenVersion::parse(s)))
    }

    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Hard(_))
    }

    /// Whether `version` satisfies this constraint. Soft and latest
    /// constraints accept anything.
    pub fn allows(&self, version: &MavenVersion) -> bool {
        match self {
            Self::Hard(ranges) => ranges.iter().any(|r| r.contains(version)),
            Self::Soft(_) | Self::Latest => true,
        }
    }

    /// The single version a soft constraint names.
    pub fn soft_version(&self) -> Option<&MavenVersion> {
        match self {
            Self::Soft(v) => Some(v),
            _ => None,
        }
    }

    /// The constraint to send to a version range resolver. `latest` becomes
    /// an unbounded range.
    pub fn to_query(&self) -> VersionConstraint {
        match self {
            Self::Latest => Self::Hard(vec![VersionRange::unbounded()]),
            other => other.clone(),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soft(v) => write!(f, "{v}"),
            Self::Latest => f.write_str("latest"),
            Self::Hard(ranges) => {
                for (i, r) in ranges.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{r}")?;
                }
                Ok(())
            }
        }
    }
}

// Identity follows the textual form so constraints can key caches.
impl PartialEq for VersionConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for VersionConstraint {}

impl Hash for VersionConstraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

/// A transitive dependency to exclude. `*` matches any group or name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exclusion {
    pub group: String,
    pub name: Option<String>,
}

impl Exclusion {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: Some(name.into()),
        }
    }

    /// Exclude every package of a group.
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: None,
        }
    }

    pub fn matches(&self, id: &LogicalId) -> bool {
        let group_ok = self.group == "*" || self.group == id.group;
        let name_ok = match self.name.as_deref() {
            None | Some("*") => true,
            Some(name) => name == id.name,
        };
        group_ok && name_ok
    }
}

/// A dependency edge as declared by a caller or a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub group: String,
    pub name: String,
    pub classifier: Option<String>,
    pub constraint: VersionConstraint,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
    /// Local path for `system` dependencies; such packages have no descriptor.
    pub system_path: Option<String>,
}

impl Dependency {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        constraint: VersionConstraint,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            classifier: None,
            constraint,
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
            system_path: None,
        }
    }

    /// Parse `group:name:constraint` or `group:name:classifier:constraint`.
    ///
    /// The constraint segment may itself contain commas (`[1.0,2.0)`), but
    /// never colons.
    pub fn parse(s: &str) -> Result<Self, GravenError> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let (group, name, classifier, constraint) = match parts.as_slice() {
            [g, n, v] => (*g, *n, None, *v),
            [g, n, c, v] => (*g, *n, Some(*c), *v),
            _ => {
                return Err(GravenError::Coordinate {
                    input: s.to_string(),
                    reason: format!("expected 3 or 4 segments, found {}", parts.len()),
                })
            }
        };
        let to_err = |reason: String| GravenError::Coordinate {
            input: s.to_string(),
            reason,
        };
        validate_segment("group", group).map_err(to_err)?;
        validate_segment("name", name).map_err(to_err)?;
        if let Some(c) = classifier {
            validate_segment("classifier", c).map_err(to_err)?;
        }
        let constraint = VersionConstraint::parse(constraint).map_err(|e| to_err(e.to_string()))?;
        let mut dep = Self::new(group, name, constraint);
        dep.classifier = classifier.map(str::to_string);
        Ok(dep)
    }

    /// Check that group, name and classifier are usable coordinate segments,
    /// and that a system dependency names one exact version.
    pub fn validate(&self) -> Result<(), String> {
        validate_segment("group", &self.group)?;
        validate_segment("name", &self.name)?;
        if let Some(ref c) = self.classifier {
            validate_segment("classifier", c)?;
        }
        if self.lacks_descriptor() && self.constraint.soft_version().is_none() {
            return Err(format!(
                "system dependency needs an exact version, not `{}`",
                self.constraint
            ));
        }
        Ok(())
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn logical_id(&self) -> LogicalId {
        LogicalId {
            group: self.group.clone(),
            name: self.name.clone(),
            classifier: self.classifier.clone(),
        }
    }

    /// The concrete coordinate of this dependency at `version`.
    pub fn at(&self, version: &str) -> Coordinate {
        self.logical_id().at(version)
    }

    /// Re-point this dependency at a relocated package, keeping scope,
    /// exclusions and optionality.
    pub fn relocated_to(&self, target: &Coordinate) -> Self {
        Self {
            group: target.group.clone(),
            name: target.name.clone(),
            classifier: target.classifier.clone(),
            constraint: VersionConstraint::Soft(MavenVersion::parse(&target.version)),
            ..self.clone()
        }
    }

    /// Packages without a descriptor: nothing to fetch, nothing to traverse.
    pub fn lacks_descriptor(&self) -> bool {
        self.scope == Scope::System || self.system_path.is_some()
    }
}

/// A dependency-management entry: version and scope overrides for one
/// package, applied to transitive edges below the declaring node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedDependency {
    pub id: LogicalId,
    pub constraint: Option<VersionConstraint>,
    pub scope: Option<Scope>,
}

impl ManagedDependency {
    pub fn new(id: LogicalId) -> Self {
        Self {
            id,
            constraint: None,
            scope: None,
        }
    }

    /// Parse `group:name:version` as a version-only override.
    pub fn parse(s: &str) -> Result<Self, GravenError> {
        let dep = Dependency::parse(s)?;
        Ok(Self::new(dep.logical_id()).with_constraint(dep.constraint))
    }

    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.logical_id(), self.constraint, self.scope)
    }
}
