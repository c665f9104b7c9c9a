//! Parse and stringify configuration.

use std::env;
use std::fmt;
use std::str::FromStr;

/// Default line width for folded scalars.
const DEFAULT_LINE_WIDTH: usize = 80;

/// Get the line width from the YAMP_LINE_WIDTH env var or default.
fn default_line_width() -> usize {
    env::var("YAMP_LINE_WIDTH")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_LINE_WIDTH)
}

/// A supported YAML version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    V1_1,
    #[default]
    V1_2,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::V1_1 => "1.1",
            Version::V1_2 => "1.2",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.1" => Ok(Version::V1_1),
            "1.2" => Ok(Version::V1_2),
            _ => Err(format!("Unsupported YAML version {}", s)),
        }
    }
}

/// One of the built-in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaName {
    Failsafe,
    Json,
    Core,
    Yaml11,
}

impl SchemaName {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaName::Failsafe => "failsafe",
            SchemaName::Json => "json",
            SchemaName::Core => "core",
            SchemaName::Yaml11 => "yaml-1.1",
        }
    }

    /// The schema a version uses unless told otherwise.
    pub fn for_version(version: Version) -> Self {
        match version {
            Version::V1_1 => SchemaName::Yaml11,
            Version::V1_2 => SchemaName::Core,
        }
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "failsafe" => Ok(SchemaName::Failsafe),
            "json" => Ok(SchemaName::Json),
            "core" => Ok(SchemaName::Core),
            "yaml-1.1" | "yaml11" => Ok(SchemaName::Yaml11),
            _ => Err(format!("Unknown schema {}", s)),
        }
    }
}

/// What to do when a mapping repeats a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateKeys {
    #[default]
    Error,
    Warning,
    Allow,
}

/// Options for parsing and composing.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Source name used in error messages.
    pub filename: Option<String>,
    /// Version assumed for documents without a `%YAML` directive.
    pub version: Version,
    /// Schema override; by default it follows the document's version.
    pub schema: Option<SchemaName>,
    /// Unresolved tags are errors rather than warnings.
    pub strict: bool,
    pub duplicate_keys: DuplicateKeys,
    /// Merge key override; by default only the YAML 1.1 schema merges.
    pub merge_keys: Option<bool>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            filename: None,
            version: Version::V1_2,
            schema: None,
            strict: true,
            duplicate_keys: DuplicateKeys::Error,
            merge_keys: None,
        }
    }
}

impl ParseOptions {
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_schema(mut self, schema: SchemaName) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_duplicate_keys(mut self, duplicate_keys: DuplicateKeys) -> Self {
        self.duplicate_keys = duplicate_keys;
        self
    }

    pub fn with_merge_keys(mut self, merge_keys: bool) -> Self {
        self.merge_keys = Some(merge_keys);
        self
    }

    /// The schema for a document of the given version.
    pub fn schema_for(&self, version: Version) -> SchemaName {
        self.schema.unwrap_or_else(|| SchemaName::for_version(version))
    }
}

/// Options for turning documents back into text.
#[derive(Debug, Clone)]
pub struct StringifyOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Folded block scalars wrap at this column.
    pub line_width: usize,
    /// Schema used to decide whether a string can be written plain;
    /// by default the document's own.
    pub schema: Option<SchemaName>,
}

impl Default for StringifyOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            line_width: default_line_width(),
            schema: None,
        }
    }
}

impl StringifyOptions {
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent.max(1);
        self
    }

    pub fn with_line_width(mut self, line_width: usize) -> Self {
        self.line_width = line_width;
        self
    }

    pub fn with_schema(mut self, schema: SchemaName) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ParseOptions::default();
        assert_eq!(opts.version, Version::V1_2);
        assert!(opts.strict);
        assert_eq!(opts.duplicate_keys, DuplicateKeys::Error);
        assert_eq!(opts.schema_for(Version::V1_1), SchemaName::Yaml11);
        assert_eq!(opts.schema_for(Version::V1_2), SchemaName::Core);
        let opts = opts.with_schema(SchemaName::Json);
        assert_eq!(opts.schema_for(Version::V1_1), SchemaName::Json);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("1.1".parse::<Version>(), Ok(Version::V1_1));
        assert!("2.0".parse::<Version>().is_err());
        assert_eq!("yaml-1.1".parse::<SchemaName>(), Ok(SchemaName::Yaml11));
        assert_eq!(SchemaName::Failsafe.to_string(), "failsafe");
    }
}
