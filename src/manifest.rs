//! Package manifest reading.
//!
//! The manifest (`manifest/package.xml`) names the artifact types a sync
//! covers and the API version to address the org with:
//!
//! ```xml
//! <Package version="58.0">
//!   <types>
//!     <name>SourceClass</name>
//!   </types>
//! </Package>
//! ```

use std::path::Path;

use crate::project::ConfigError;

/// Parsed package manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub api_version: String,
    pub types: Vec<String>,
}

impl Manifest {
    /// Read and parse the manifest at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let doc = roxmltree::Document::parse(content).map_err(|source| ConfigError::ManifestXml {
            path: path.to_path_buf(),
            source,
        })?;

        let package = doc.root_element();
        if package.tag_name().name() != "Package" {
            return Err(ConfigError::ManifestNoPackage {
                path: path.to_path_buf(),
            });
        }

        let api_version = package
            .attribute("version")
            .map(str::to_string)
            .ok_or_else(|| ConfigError::ManifestNoVersion {
                path: path.to_path_buf(),
            })?;

        let mut types = Vec::new();
        for types_node in package.children().filter(|n| n.has_tag_name("types")) {
            for name in types_node.children().filter(|n| n.has_tag_name("name")) {
                if let Some(text) = name.text() {
                    let text = text.trim();
                    if !text.is_empty() {
                        types.push(text.to_string());
                    }
                }
            }
        }

        if types.is_empty() {
            return Err(ConfigError::ManifestNoTypes {
                path: path.to_path_buf(),
            });
        }

        Ok(Self { api_version, types })
    }

    /// The first declared artifact type, which drives target listing.
    pub fn primary_type(&self) -> &str {
        &self.types[0]
    }
}
