//! Maven 2 repository layout and per-repository authentication.
//!
//! Credentials come from `~/.graven/config.toml`:
//!
//! ```toml
//! [credentials.my-private]
//! username = "deploy"
//! password = "s3cret"
//! ```
//!
//! A password without a username is sent as a bearer token.

use graven_core::config::CredentialEntry;
use graven_core::coordinate::Coordinate;
use graven_core::repository::Repository;
use reqwest::RequestBuilder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Anonymous,
    Basic { username: String, password: Option<String> },
    Bearer(String),
}

impl Auth {
    fn from_entry(entry: Option<&CredentialEntry>) -> Self {
        let Some(entry) = entry else {
            return Auth::Anonymous;
        };
        match (entry.username.clone(), entry.password.clone()) {
            (Some(username), password) => Auth::Basic { username, password },
            (None, Some(token)) => Auth::Bearer(token),
            (None, None) => Auth::Anonymous,
        }
    }
}

/// A repository ready for HTTP access: base URL without trailing slash,
/// plus how to authenticate against it.
#[derive(Debug, Clone)]
pub struct MavenRepository {
    pub name: String,
    pub url: String,
    pub auth: Auth,
}

impl MavenRepository {
    pub fn from_repository(repo: &Repository, credentials: Option<&CredentialEntry>) -> Self {
        Self {
            name: repo.id.clone(),
            url: repo.url.trim_end_matches('/').to_string(),
            auth: Auth::from_entry(credentials),
        }
    }

    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Anonymous => request,
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::Bearer(token) => request.bearer_auth(token),
        }
    }

    /// `group/with/slashes/name`, the directory holding every version.
    fn artifact_dir(&self, group: &str, name: &str) -> String {
        format!("{}/{}/{}", self.url, group.replace('.', "/"), name)
    }

    /// POM location. POMs are never classified, so the classifier is ignored.
    pub fn pom_url(&self, coordinate: &Coordinate) -> String {
        let Coordinate {
            group,
            name,
            version,
            ..
        } = coordinate;
        format!(
            "{}/{version}/{name}-{version}.pom",
            self.artifact_dir(group, name)
        )
    }

    /// The artifact-level `maven-metadata.xml` listing published versions.
    pub fn metadata_url(&self, group: &str, name: &str) -> String {
        format!("{}/maven-metadata.xml", self.artifact_dir(group, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn central() -> MavenRepository {
        MavenRepository::from_repository(&Repository::maven_central(), None)
    }

    #[test]
    fn pom_urls_follow_the_maven_layout() {
        let coord = Coordinate::new("com.google.guava", "guava", "33.0.0-jre");
        assert_eq!(
            central().pom_url(&coord),
            "https://repo.maven.apache.org/maven2/com/google/guava/guava/33.0.0-jre/guava-33.0.0-jre.pom"
        );
    }

    #[test]
    fn classifier_does_not_change_the_pom() {
        let coord = Coordinate::new("com.example", "my-lib", "1.0").with_classifier("sources");
        assert!(central().pom_url(&coord).ends_with("com/example/my-lib/1.0/my-lib-1.0.pom"));
    }

    #[test]
    fn metadata_sits_beside_the_versions() {
        assert_eq!(
            central().metadata_url("org.slf4j", "slf4j-api"),
            "https://repo.maven.apache.org/maven2/org/slf4j/slf4j-api/maven-metadata.xml"
        );
    }

    #[test]
    fn trailing_slash_is_dropped() {
        let repo = MavenRepository::from_repository(
            &Repository::new("test", "https://repo.example.com/maven/"),
            None,
        );
        assert_eq!(repo.url, "https://repo.example.com/maven");
        assert_eq!(repo.auth, Auth::Anonymous);
    }

    #[test]
    fn credential_shapes() {
        let entry = |username: Option<&str>, password: Option<&str>| CredentialEntry {
            username: username.map(String::from),
            password: password.map(String::from),
        };
        let nexus = Repository::new("nexus", "https://nexus.example.com/maven");

        let basic = MavenRepository::from_repository(&nexus, Some(&entry(Some("u"), Some("p"))));
        assert_eq!(
            basic.auth,
            Auth::Basic {
                username: "u".into(),
                password: Some("p".into())
            }
        );
        let token = MavenRepository::from_repository(&nexus, Some(&entry(None, Some("t"))));
        assert_eq!(token.auth, Auth::Bearer("t".into()));
        let empty = MavenRepository::from_repository(&nexus, Some(&entry(None, None)));
        assert_eq!(empty.auth, Auth::Anonymous);
    }
}
