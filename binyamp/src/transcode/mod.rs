//! Conversions from composed YAML documents to other formats.

pub mod json;
