//! Parser configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which front end reads the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Directory tree following the naming grammar.
    #[default]
    Files,
    /// Markdown documents.
    Markdown,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Files => "files",
            SourceFormat::Markdown => "markdown",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "files" | "file" | "dir" => Ok(SourceFormat::Files),
            "markdown" | "md" => Ok(SourceFormat::Markdown),
            other => Err(format!(
                "Unsupported source format: '{other}'. Supported: files, markdown"
            )),
        }
    }
}

/// Options shared by both front ends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParseOptions {
    #[serde(default)]
    pub format: SourceFormat,

    /// Manifest name. Defaults to the base name of the parsed root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional archetypes sidecar, looked up in the parsed root.
    #[serde(default = "default_archetypes_file")]
    pub archetypes_file: String,
}

fn default_archetypes_file() -> String {
    "archetypes.json".to_string()
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            format: SourceFormat::default(),
            name: None,
            archetypes_file: default_archetypes_file(),
        }
    }
}

impl ParseOptions {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let options: ParseOptions = serde_yaml::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                anyhow::bail!("'name' must not be empty when set");
            }
        }

        // Bare file name with an extension: the walkers skip it as data.
        let file = Path::new(&self.archetypes_file);
        if file.components().count() != 1 || file.extension().is_none() {
            anyhow::bail!(
                "Invalid 'archetypes_file': '{}'. Expected a file name with an extension, e.g. 'archetypes.json'",
                self.archetypes_file
            );
        }

        Ok(())
    }

    /// Manifest name for a parse of `root`.
    pub fn manifest_name(&self, root: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let options: ParseOptions = serde_yaml::from_str("{}").unwrap();
        assert_eq!(options, ParseOptions::default());
        assert_eq!(options.format, SourceFormat::Files);
        assert_eq!(options.archetypes_file, "archetypes.json");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = "format: markdown\nname: notes\narchetypes_file: rules.json\n";
        let options: ParseOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.format, SourceFormat::Markdown);
        assert_eq!(options.name.as_deref(), Some("notes"));
        assert_eq!(options.archetypes_file, "rules.json");
    }

    #[test]
    fn test_validate_rejects_bad_archetypes_file() {
        for bad in ["archetypes", "nested/archetypes.json", ""] {
            let options = ParseOptions {
                archetypes_file: bad.to_string(),
                ..Default::default()
            };
            assert!(options.validate().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let options = ParseOptions {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pit.yml");
        std::fs::write(&path, "format: markdown\n").unwrap();
        let options = ParseOptions::from_file(&path).unwrap();
        assert_eq!(options.format, SourceFormat::Markdown);
    }

    #[test]
    fn test_manifest_name() {
        let options = ParseOptions::default();
        assert_eq!(options.manifest_name(&PathBuf::from("/tmp/notes")), "notes");

        let named = ParseOptions {
            name: Some("auth".to_string()),
            ..Default::default()
        };
        assert_eq!(named.manifest_name(&PathBuf::from("/tmp/notes")), "auth");
    }

    #[test]
    fn test_source_format_from_str() {
        assert_eq!("md".parse::<SourceFormat>().unwrap(), SourceFormat::Markdown);
        assert_eq!("Files".parse::<SourceFormat>().unwrap(), SourceFormat::Files);
        assert!("yaml".parse::<SourceFormat>().is_err());
    }
}
