//! Dependency scopes: the acceptance lattice used when filtering a resolved
//! graph, and the derivation table applied to every transitive edge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use graven_util::errors::GravenError;

/// Maven-compatible dependency scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Runtime,
    Test,
    Provided,
    System,
    Annotation,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Compile
    }
}

impl Scope {
    pub const ALL: [Scope; 6] = [
        Scope::Compile,
        Scope::Runtime,
        Scope::Test,
        Scope::Provided,
        Scope::System,
        Scope::Annotation,
    ];

    /// The identifier used in descriptors and configuration.
    pub fn id(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Runtime => "runtime",
            Self::Test => "test",
            Self::Provided => "provided",
            Self::System => "system",
            Self::Annotation => "annotation",
        }
    }

    /// Other scope identifiers this scope admits when filtering a subtree.
    fn accepted(self) -> &'static [&'static str] {
        match self {
            Self::Compile => &["compile", "provided", "system"],
            Self::Runtime => &["runtime", "compile"],
            Self::Test => &["test"],
            Self::Provided => &["provided"],
            Self::System => &["system"],
            Self::Annotation => &["annotation"],
        }
    }

    /// Whether a node declared with `candidate` passes a filter for `self`.
    ///
    /// An absent scope is always accepted.
    pub fn accepts(self, candidate: Option<&str>) -> bool {
        match candidate {
            None => true,
            Some(id) => id == self.id() || self.accepted().contains(&id),
        }
    }

    /// Typed shorthand for [`Scope::accepts`].
    pub fn accepts_scope(self, candidate: Scope) -> bool {
        self.accepts(Some(candidate.id()))
    }

    /// Parse a scope declared by a third-party descriptor.
    ///
    /// Blank input is `compile`; unknown identifiers (`import`, tool-specific
    /// scopes) land on `runtime`, the fall-through row of [`derive`].
    pub fn from_declared(declared: Option<&str>) -> Scope {
        match declared.map(str::trim) {
            None | Some("") => Scope::Compile,
            Some(s) => s.parse().unwrap_or(Scope::Runtime),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Scope {
    type Err = GravenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Scope::ALL
            .into_iter()
            .find(|scope| scope.id() == lower)
            .ok_or_else(|| GravenError::Generic {
                message: format!("unknown scope `{s}`"),
            })
    }
}

/// Effective scope of a transitive edge.
///
/// `parent` is the derived scope of the depending node (`None` for the
/// root); `child` is the scope declared on the edge.
pub fn derive(parent: Option<Scope>, child: Scope) -> Scope {
    match (parent, child) {
        (_, Scope::System | Scope::Test) => child,
        (None | Some(Scope::Compile), _) => child,
        (Some(p @ (Scope::Test | Scope::Runtime | Scope::Annotation)), _) => p,
        (Some(Scope::System | Scope::Provided), _) => Scope::Provided,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_scope_always_accepted() {
        for scope in Scope::ALL {
            assert!(scope.accepts(None));
        }
    }

    #[test]
    fn acceptance_is_not_symmetric() {
        assert!(Scope::Compile.accepts(Some("provided")));
        assert!(!Scope::Provided.accepts(Some("compile")));
        assert!(Scope::Runtime.accepts(Some("compile")));
        assert!(!Scope::Compile.accepts(Some("runtime")));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Runtime".parse::<Scope>().unwrap(), Scope::Runtime);
        assert!("import".parse::<Scope>().is_err());
    }

    #[test]
    fn declared_scope_is_lenient() {
        assert_eq!(Scope::from_declared(None), Scope::Compile);
        assert_eq!(Scope::from_declared(Some("  ")), Scope::Compile);
        assert_eq!(Scope::from_declared(Some("provided")), Scope::Provided);
        assert_eq!(Scope::from_declared(Some("import")), Scope::Runtime);
    }
}
