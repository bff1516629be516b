//! POM reading. The XML is first loaded into a small element tree, then
//! the fields the resolver cares about are pulled out of it: coordinates,
//! parent, properties, dependencies, dependency management, declared
//! repositories and relocation.

use std::collections::BTreeMap;

use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::{Dependency, Exclusion, ManagedDependency, VersionConstraint};
use graven_core::repository::Repository;
use graven_core::scope::Scope;
use graven_core::source::Descriptor;
use graven_util::errors::GravenError;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Nested `${...}` references deeper than this are left unexpanded.
const MAX_EXPANSION_DEPTH: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,

    pub parent: Option<ParentRef>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
    pub repositories: Vec<PomRepository>,
    pub relocation: Option<Relocation>,
}

#[derive(Debug, Clone, Default)]
pub struct ParentRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl ParentRef {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.group_id, &self.artifact_id, &self.version)
    }
}

/// One `<dependency>` element, uninterpreted.
#[derive(Debug, Clone, Default)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub classifier: Option<String>,
    pub type_: Option<String>,
    pub system_path: Option<String>,
    pub exclusions: Vec<PomExclusion>,
}

#[derive(Debug, Clone, Default)]
pub struct PomExclusion {
    pub group_id: String,
    pub artifact_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PomRepository {
    pub id: String,
    pub url: String,
}

/// `<distributionManagement><relocation>`. Absent fields keep the value of
/// the relocated package.
#[derive(Debug, Clone, Default)]
pub struct Relocation {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn descend(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |at, name| at.child(name))
    }

    /// Children named `item` of the element at `path`.
    fn list<'a>(&'a self, path: &[&str], item: &'a str) -> impl Iterator<Item = &'a Element> {
        self.descend(path)
            .into_iter()
            .flat_map(move |list| list.children.iter().filter(move |c| c.name == item))
    }

    fn text_of(&self, name: &str) -> Option<String> {
        self.child(name).map(|c| c.text.trim().to_string())
    }
}

fn malformed(message: impl Into<String>) -> GravenError {
    GravenError::Descriptor {
        message: format!("malformed POM: {}", message.into()),
    }
}

fn read_tree(xml: &str) -> Result<Element, GravenError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut open = vec![Element::default()];
    loop {
        let event = reader.read_event().map_err(|e| malformed(e.to_string()))?;
        match event {
            Event::Start(tag) => open.push(Element {
                name: String::from_utf8_lossy(tag.local_name().as_ref()).into_owned(),
                ..Element::default()
            }),
            Event::Empty(tag) => {
                let empty = Element {
                    name: String::from_utf8_lossy(tag.local_name().as_ref()).into_owned(),
                    ..Element::default()
                };
                if let Some(parent) = open.last_mut() {
                    parent.children.push(empty);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| malformed(e.to_string()))?;
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let closed = open.pop().filter(|_| !open.is_empty());
                match (closed, open.last_mut()) {
                    (Some(closed), Some(parent)) => parent.children.push(closed),
                    _ => return Err(malformed("unbalanced end tag")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let document = match open.pop() {
        Some(document) if open.is_empty() => document,
        _ => return Err(malformed("document ends inside an open element")),
    };
    document
        .children
        .into_iter()
        .find(|e| e.name == "project")
        .ok_or_else(|| malformed("no <project> element"))
}

/// Parse POM XML. Nothing is interpolated or inherited yet.
pub fn parse_pom(xml: &str) -> miette::Result<Pom> {
    let project = read_tree(xml)?;
    Ok(Pom::from_project(&project))
}

impl PomDependency {
    fn from_element(e: &Element) -> Self {
        Self {
            group_id: e.text_of("groupId").unwrap_or_default(),
            artifact_id: e.text_of("artifactId").unwrap_or_default(),
            version: e.text_of("version"),
            scope: e.text_of("scope"),
            optional: e.text_of("optional").is_some_and(|v| v == "true"),
            classifier: e.text_of("classifier"),
            type_: e.text_of("type"),
            system_path: e.text_of("systemPath"),
            exclusions: e
                .list(&["exclusions"], "exclusion")
                .map(|x| PomExclusion {
                    group_id: x.text_of("groupId").unwrap_or_default(),
                    artifact_id: x.text_of("artifactId"),
                })
                .collect(),
        }
    }

    fn is_bom_import(&self) -> bool {
        self.scope.as_deref() == Some("import") && self.type_.as_deref() == Some("pom")
    }

    fn same_artifact(&self, other: &PomDependency) -> bool {
        self.group_id == other.group_id && self.artifact_id == other.artifact_id
    }
}

impl Pom {
    fn from_project(project: &Element) -> Self {
        Self {
            group_id: project.text_of("groupId"),
            artifact_id: project.text_of("artifactId"),
            version: project.text_of("version"),
            packaging: project.text_of("packaging"),
            parent: project.child("parent").map(|p| ParentRef {
                group_id: p.text_of("groupId").unwrap_or_default(),
                artifact_id: p.text_of("artifactId").unwrap_or_default(),
                version: p.text_of("version").unwrap_or_default(),
            }),
            properties: project
                .child("properties")
                .map(|props| {
                    props
                        .children
                        .iter()
                        .map(|p| (p.name.clone(), p.text.trim().to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            dependencies: project
                .list(&["dependencies"], "dependency")
                .map(PomDependency::from_element)
                .collect(),
            dependency_management: project
                .list(&["dependencyManagement", "dependencies"], "dependency")
                .map(PomDependency::from_element)
                .collect(),
            repositories: project
                .list(&["repositories"], "repository")
                .map(|r| PomRepository {
                    id: r.text_of("id").unwrap_or_default(),
                    url: r.text_of("url").unwrap_or_default(),
                })
                .collect(),
            relocation: project
                .descend(&["distributionManagement", "relocation"])
                .map(|r| Relocation {
                    group_id: r.text_of("groupId"),
                    artifact_id: r.text_of("artifactId"),
                    version: r.text_of("version"),
                    message: r.text_of("message"),
                }),
        }
    }

    /// Own group, else the parent's.
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.group_id.as_str()))
    }

    /// Own version, else the parent's.
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.version.as_str()))
    }

    fn property(&self, key: &str) -> Option<String> {
        let field = key
            .strip_prefix("project.")
            .or_else(|| key.strip_prefix("pom."));
        let parent = self.parent.as_ref();
        match field {
            Some("groupId") => self.effective_group_id().map(str::to_string),
            Some("artifactId") => self.artifact_id.clone(),
            Some("version") => self.effective_version().map(str::to_string),
            Some("packaging") => self.packaging.clone(),
            Some("parent.groupId") => parent.map(|p| p.group_id.clone()),
            Some("parent.artifactId") => parent.map(|p| p.artifact_id.clone()),
            Some("parent.version") => parent.map(|p| p.version.clone()),
            _ => self.properties.get(key).cloned(),
        }
    }

    /// Expand `${...}` references from the POM's properties and `project.*`
    /// fields. Unknown references stay as written.
    pub fn interpolate(&self, input: &str) -> String {
        self.expand(input, 0)
    }

    fn expand(&self, input: &str, depth: usize) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                rest = &rest[start..];
                break;
            };
            let key = &after[..end];
            match self.property(key) {
                Some(value) if depth < MAX_EXPANSION_DEPTH => {
                    out.push_str(&self.expand(&value, depth + 1))
                }
                _ => out.push_str(&rest[start..start + end + 3]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Interpolate every field that feeds the descriptor.
    pub fn resolve_properties(&mut self) {
        let source = self.clone();
        let fill = |s: &mut String| *s = source.interpolate(s);
        let fill_opt = |s: &mut Option<String>| {
            if let Some(v) = s {
                *v = source.interpolate(v);
            }
        };

        for dep in self.dependencies.iter_mut().chain(&mut self.dependency_management) {
            fill(&mut dep.group_id);
            fill(&mut dep.artifact_id);
            fill_opt(&mut dep.version);
            fill_opt(&mut dep.classifier);
            fill_opt(&mut dep.system_path);
        }
        for repo in &mut self.repositories {
            fill(&mut repo.url);
        }
        if let Some(relocation) = &mut self.relocation {
            fill_opt(&mut relocation.group_id);
            fill_opt(&mut relocation.artifact_id);
            fill_opt(&mut relocation.version);
        }
    }

    /// Inherit from a parent: properties and management entries not set
    /// here, group and version when missing, and declared repositories.
    pub fn apply_parent(&mut self, parent: &Pom) {
        for (key, value) in &parent.properties {
            if !self.properties.contains_key(key) {
                self.properties.insert(key.clone(), value.clone());
            }
        }
        self.group_id = self
            .group_id
            .take()
            .or_else(|| parent.effective_group_id().map(str::to_string));
        self.version = self
            .version
            .take()
            .or_else(|| parent.effective_version().map(str::to_string));
        self.add_management(parent.dependency_management.iter());
        for repo in &parent.repositories {
            if self.repositories.iter().all(|r| r.id != repo.id) {
                self.repositories.push(repo.clone());
            }
        }
    }

    /// Take an imported BOM's management entries. Entries already managed
    /// here keep their values.
    pub fn apply_bom(&mut self, bom: &Pom) {
        self.add_management(bom.dependency_management.iter().filter(|d| !d.is_bom_import()));
    }

    fn add_management<'a>(&mut self, entries: impl Iterator<Item = &'a PomDependency>) {
        for entry in entries {
            if !self.dependency_management.iter().any(|d| d.same_artifact(entry)) {
                self.dependency_management.push(entry.clone());
            }
        }
    }

    pub fn managed_version(&self, group_id: &str, artifact_id: &str) -> Option<&str> {
        self.managed_entries()
            .find(|d| d.group_id == group_id && d.artifact_id == artifact_id)?
            .version
            .as_deref()
    }

    fn managed_entries(&self) -> impl Iterator<Item = &PomDependency> {
        self.dependency_management.iter().filter(|d| !d.is_bom_import())
    }

    /// `<scope>import</scope>` + `<type>pom</type>` management entries.
    pub fn bom_imports(&self) -> Vec<&PomDependency> {
        self.dependency_management
            .iter()
            .filter(|d| d.is_bom_import())
            .collect()
    }

    /// Where `requested` moved to, if this POM relocates it somewhere else.
    pub fn relocation_target(&self, requested: &Coordinate) -> Option<Coordinate> {
        let relocation = self.relocation.as_ref()?;
        let or_requested = |field: &Option<String>, fallback: &String| {
            field.clone().unwrap_or_else(|| fallback.clone())
        };
        let target = Coordinate {
            group: or_requested(&relocation.group_id, &requested.group),
            name: or_requested(&relocation.artifact_id, &requested.name),
            classifier: requested.classifier.clone(),
            version: or_requested(&relocation.version, &requested.version),
        };
        if target == *requested {
            None
        } else {
            Some(target)
        }
    }

    /// Build the engine descriptor for `requested` from an effective POM
    /// (parents merged, properties interpolated).
    ///
    /// A relocating POM produces a bare descriptor of the target; the engine
    /// reads the target itself. Dependencies left without a usable version
    /// are dropped with a warning.
    pub fn to_descriptor(&self, requested: &Coordinate) -> Descriptor {
        if let Some(target) = self.relocation_target(requested) {
            match self.relocation.as_ref().and_then(|r| r.message.as_deref()) {
                Some(note) => tracing::info!("{requested} moved to {target}: {note}"),
                None => tracing::debug!("{requested} moved to {target}"),
            }
            return Descriptor::new(target);
        }

        let mut descriptor = Descriptor::new(requested.clone());
        descriptor.dependencies = self
            .dependencies
            .iter()
            .filter_map(|d| self.declared_dependency(d, requested))
            .collect();
        descriptor.managed = self
            .managed_entries()
            .filter_map(|d| managed_dependency(d, requested))
            .collect();
        descriptor.repositories = self
            .repositories
            .iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| Repository::new(r.id.clone(), r.url.clone()))
            .collect();
        descriptor
    }

    fn declared_dependency(&self, dep: &PomDependency, owner: &Coordinate) -> Option<Dependency> {
        let label = format!("{}:{}", dep.group_id, dep.artifact_id);
        let version = dep
            .version
            .as_deref()
            .or_else(|| self.managed_version(&dep.group_id, &dep.artifact_id));
        let Some(version) = version else {
            tracing::warn!("{owner} declares {label} without a version; skipped");
            return None;
        };
        let constraint = VersionConstraint::parse(version)
            .map_err(|e| tracing::warn!("{owner} declares {label} with {e}; skipped"))
            .ok()?;

        let mut dependency = Dependency::new(&dep.group_id, &dep.artifact_id, constraint)
            .with_scope(Scope::from_declared(dep.scope.as_deref()))
            .with_optional(dep.optional);
        dependency.classifier = dep.classifier.clone();
        dependency.system_path = dep.system_path.clone();
        dependency.exclusions = dep
            .exclusions
            .iter()
            .map(|x| Exclusion {
                group: x.group_id.clone(),
                name: x.artifact_id.clone(),
            })
            .collect();
        Some(dependency)
    }
}

/// A management entry carrying at least a version or a scope.
fn managed_dependency(entry: &PomDependency, owner: &Coordinate) -> Option<ManagedDependency> {
    let constraint = entry.version.as_deref().and_then(|v| {
        VersionConstraint::parse(v)
            .map_err(|e| {
                tracing::debug!(
                    "{owner} manages {}:{} with unusable version: {e}",
                    entry.group_id,
                    entry.artifact_id
                )
            })
            .ok()
    });
    let scope = entry.scope.as_deref().map(|s| Scope::from_declared(Some(s)));
    if constraint.is_none() && scope.is_none() {
        return None;
    }
    Some(ManagedDependency {
        constraint,
        scope,
        ..ManagedDependency::new(LogicalId {
            group: entry.group_id.clone(),
            name: entry.artifact_id.clone(),
            classifier: entry.classifier.clone(),
        })
    })
}
