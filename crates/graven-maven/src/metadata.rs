//! Version listings from artifact-level `maven-metadata.xml`.

use graven_core::dependency::VersionConstraint;
use graven_core::version::MavenVersion;
use graven_util::errors::GravenError;
use quick_xml::events::Event;
use quick_xml::Reader;

/// The parts of `maven-metadata.xml` the resolver reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionListing {
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Vec<String>,
}

impl VersionListing {
    pub fn parse(xml: &str) -> miette::Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut listing = Self::default();
        let mut depth_in_versioning = None;
        let mut open: Vec<Vec<u8>> = Vec::new();
        loop {
            let event = reader.read_event().map_err(|e| GravenError::Descriptor {
                message: format!("maven-metadata.xml at byte {}: {e}", reader.buffer_position()),
            })?;
            match event {
                Event::Start(tag) => {
                    if tag.name().as_ref() == b"versioning" && open.len() == 1 {
                        depth_in_versioning = Some(open.len() + 1);
                    }
                    open.push(tag.name().as_ref().to_vec());
                }
                Event::End(_) => {
                    if depth_in_versioning == Some(open.len()) {
                        depth_in_versioning = None;
                    }
                    open.pop();
                }
                Event::Text(text) if depth_in_versioning.is_some() => {
                    let value = text.unescape().map_err(|e| GravenError::Descriptor {
                        message: format!("maven-metadata.xml: {e}"),
                    })?;
                    let value = value.trim().to_string();
                    match open.iter().map(Vec::as_slice).collect::<Vec<_>>().as_slice() {
                        [_, b"versioning", b"latest"] => listing.latest = Some(value),
                        [_, b"versioning", b"release"] => listing.release = Some(value),
                        [_, b"versioning", b"versions", b"version"] if !value.is_empty() => {
                            listing.versions.push(value)
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !open.is_empty() {
            return Err(GravenError::Descriptor {
                message: "maven-metadata.xml ends inside an open element".into(),
            }
            .into());
        }
        Ok(listing)
    }
}

/// Union of several repositories' listings, restricted to `constraint`,
/// ascending and without duplicates.
pub fn matching_versions<'a>(
    listings: impl IntoIterator<Item = &'a VersionListing>,
    constraint: &VersionConstraint,
) -> Vec<MavenVersion> {
    let mut found: Vec<MavenVersion> = listings
        .into_iter()
        .flat_map(|listing| &listing.versions)
        .map(|v| MavenVersion::parse(v))
        .filter(|v| constraint.allows(v))
        .collect();
    found.sort();
    found.dedup_by(|a, b| a.as_str() == b.as_str());
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_versioning_block() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.slf4j</groupId>
  <artifactId>slf4j-api</artifactId>
  <versioning>
    <latest>2.0.9</latest>
    <release>2.0.9</release>
    <versions>
      <version>1.7.36</version>
      <version>2.0.0</version>
      <version> </version>
      <version>2.0.9</version>
    </versions>
    <lastUpdated>20231001000000</lastUpdated>
  </versioning>
</metadata>"#;
        let listing = VersionListing::parse(xml).unwrap();
        assert_eq!(listing.latest.as_deref(), Some("2.0.9"));
        assert_eq!(listing.release.as_deref(), Some("2.0.9"));
        assert_eq!(listing.versions, vec!["1.7.36", "2.0.0", "2.0.9"]);
    }

    #[test]
    fn version_tags_outside_versioning_are_ignored() {
        let xml = "<metadata><version>9.9</version><versioning><versions>\
                   <version>1.0</version></versions></versioning></metadata>";
        assert_eq!(VersionListing::parse(xml).unwrap().versions, vec!["1.0"]);
    }

    #[test]
    fn listings_merge_filtered_and_sorted() {
        let central = VersionListing {
            versions: vec!["1.10".into(), "1.2".into(), "2.0".into()],
            ..Default::default()
        };
        let mirror = VersionListing {
            versions: vec!["1.2".into(), "1.9".into()],
            ..Default::default()
        };
        let constraint = VersionConstraint::parse("[1.0,2.0)").unwrap();
        let found: Vec<String> = matching_versions([&central, &mirror], &constraint)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(found, vec!["1.2", "1.9", "1.10"]);
    }

    #[test]
    fn truncated_documents_are_errors() {
        assert!(VersionListing::parse("<metadata><versioning></metadata>").is_err());
        assert!(VersionListing::parse("<metadata><versioning>").is_err());
    }
}
