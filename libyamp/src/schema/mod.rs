//! Schemas map plain scalar text to typed values, and explicit tags to the
//! descriptors that resolve them.
//!
//! Four schemas are built in: `failsafe` (strings, sequences and mappings
//! only), `json`, `core` (the YAML 1.2 default) and `yaml-1.1`.

mod yaml11;
mod yaml12;

use crate::directives::YAML_TAG_PREFIX;
use crate::options::SchemaName;
use crate::value::Value;
use num_bigint::BigInt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub const STR_TAG: &str = "tag:yaml.org,2002:str";
pub const SEQ_TAG: &str = "tag:yaml.org,2002:seq";
pub const MAP_TAG: &str = "tag:yaml.org,2002:map";
pub const NULL_TAG: &str = "tag:yaml.org,2002:null";
pub const BOOL_TAG: &str = "tag:yaml.org,2002:bool";
pub const INT_TAG: &str = "tag:yaml.org,2002:int";
pub const FLOAT_TAG: &str = "tag:yaml.org,2002:float";
pub const BINARY_TAG: &str = "tag:yaml.org,2002:binary";
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";
pub const SET_TAG: &str = "tag:yaml.org,2002:set";
pub const OMAP_TAG: &str = "tag:yaml.org,2002:omap";
pub const PAIRS_TAG: &str = "tag:yaml.org,2002:pairs";

/// What kind of node a tag applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Scalar,
    Sequence,
    Mapping,
}

/// Whether a descriptor takes part in resolving untagged plain scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implicit {
    /// Only through an explicit tag.
    No,
    Yes,
    /// Only in mapping key position (merge keys).
    KeyOnly,
}

/// How an integer or float was written, so it can be written back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Bin,
    Oct,
    Hex,
    Sexagesimal,
    Exp,
}

/// Turns scalar text into a value, reporting problems through the callback.
pub type ResolveFn = fn(&str, &mut dyn FnMut(String)) -> Value;

/// Writes a value back as plain scalar text.
pub type StringifyFn = fn(&Value, Option<NumberFormat>) -> String;

#[derive(Clone)]
pub struct TagDescriptor {
    pub tag: &'static str,
    pub kind: TagKind,
    pub default: Implicit,
    pub test: Option<&'static Regex>,
    pub resolve: ResolveFn,
    /// Claims values of this tag's type when stringifying plain data.
    pub identify: Option<fn(&Value) -> bool>,
    pub stringify: Option<StringifyFn>,
    pub format: Option<NumberFormat>,
}

impl fmt::Debug for TagDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDescriptor")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("format", &self.format)
            .finish()
    }
}

impl TagDescriptor {
    /// A descriptor with no test that turns text into a string.
    pub(crate) fn new(tag: &'static str, kind: TagKind) -> Self {
        Self {
            tag,
            kind,
            default: Implicit::No,
            test: None,
            resolve: resolve_str,
            identify: None,
            stringify: None,
            format: None,
        }
    }

    pub(crate) fn implicit(mut self, test: &'static Regex, resolve: ResolveFn) -> Self {
        self.default = Implicit::Yes;
        self.test = Some(test);
        self.resolve = resolve;
        self
    }

    pub(crate) fn format(mut self, format: NumberFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub(crate) fn identify(mut self, identify: fn(&Value) -> bool) -> Self {
        self.identify = Some(identify);
        self
    }

    pub(crate) fn stringify(mut self, stringify: StringifyFn) -> Self {
        self.stringify = Some(stringify);
        self
    }

    /// Does this descriptor's test accept the text?
    pub fn matches(&self, text: &str) -> bool {
        self.test.is_some_and(|re| re.is_match(text))
    }
}

/// A set of tags.
#[derive(Debug)]
pub struct Schema {
    pub name: SchemaName,
    pub tags: Vec<TagDescriptor>,
    /// `<<` keys merge mappings.
    pub merge: bool,
}

static FAILSAFE: Lazy<Schema> = Lazy::new(|| Schema {
    name: SchemaName::Failsafe,
    tags: failsafe_tags(),
    merge: false,
});
static JSON: Lazy<Schema> = Lazy::new(yaml12::json);
static CORE: Lazy<Schema> = Lazy::new(yaml12::core);
static YAML11: Lazy<Schema> = Lazy::new(yaml11::schema);

impl Schema {
    /// One of the built-in schemas.
    pub fn get(name: SchemaName) -> &'static Schema {
        match name {
            SchemaName::Failsafe => &FAILSAFE,
            SchemaName::Json => &JSON,
            SchemaName::Core => &CORE,
            SchemaName::Yaml11 => &YAML11,
        }
    }

    /// The string descriptor every schema starts with.
    pub fn str_tag(&self) -> &TagDescriptor {
        &self.tags[0]
    }

    /// Descriptor for an untagged plain scalar.
    pub fn resolve_plain(&self, text: &str, at_key: bool) -> &TagDescriptor {
        self.tags
            .iter()
            .find(|tag| {
                let implicit = match tag.default {
                    Implicit::Yes => true,
                    Implicit::KeyOnly => at_key,
                    Implicit::No => false,
                };
                implicit && tag.matches(text)
            })
            .unwrap_or_else(|| self.str_tag())
    }

    /// Descriptor for an explicitly tagged scalar. Several descriptors may
    /// share a name (`!!int` in decimal, octal, hex); the one whose test
    /// accepts the text wins, else the first.
    pub fn scalar_tag(&self, name: &str, text: &str) -> Option<&TagDescriptor> {
        let mut candidates = self
            .tags
            .iter()
            .filter(|tag| tag.kind == TagKind::Scalar && tag.tag == name)
            .peekable();
        let first = *candidates.peek()?;
        let mut tested = Vec::new();
        for tag in candidates {
            if tag.default != Implicit::No && tag.test.is_some() {
                tested.push(tag);
            } else {
                return Some(tag);
            }
        }
        Some(tested.into_iter().find(|tag| tag.matches(text)).unwrap_or(first))
    }

    /// Descriptor for an explicitly tagged collection.
    pub fn collection_tag(&self, name: &str) -> Option<&TagDescriptor> {
        self.tags
            .iter()
            .find(|tag| tag.kind != TagKind::Scalar && tag.tag == name)
    }

    /// Is any descriptor registered under this name?
    pub fn knows(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.tag == name)
    }

    /// Descriptor that claims a scalar value when stringifying.
    pub fn identify(&self, value: &Value) -> &TagDescriptor {
        self.tags
            .iter()
            .find(|tag| tag.identify.is_some_and(|identify| identify(value)))
            .unwrap_or_else(|| self.str_tag())
    }
}

/// Shorten `tag:yaml.org,2002:x` to `!!x` for messages.
pub fn short_tag(tag: &str) -> String {
    match tag.strip_prefix(YAML_TAG_PREFIX) {
        Some(suffix) => format!("!!{}", suffix),
        None => tag.to_string(),
    }
}

pub(crate) fn failsafe_tags() -> Vec<TagDescriptor> {
    vec![
        TagDescriptor::new(STR_TAG, TagKind::Scalar).identify(|v| matches!(v, Value::String(_))),
        TagDescriptor::new(SEQ_TAG, TagKind::Sequence),
        TagDescriptor::new(MAP_TAG, TagKind::Mapping),
    ]
}

// ============================================================================
// Shared resolvers
// ============================================================================

pub(crate) fn resolve_str(text: &str, _on_error: &mut dyn FnMut(String)) -> Value {
    Value::String(text.to_string())
}

pub(crate) fn resolve_null(_text: &str, _on_error: &mut dyn FnMut(String)) -> Value {
    Value::Null
}

/// Parse digits in a radix, ignoring `_` separators and an optional sign.
pub(crate) fn parse_int(text: &str, prefix_len: usize, radix: u32) -> Option<BigInt> {
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits: String = rest.get(prefix_len..)?.chars().filter(|&c| c != '_').collect();
    let n = BigInt::parse_bytes(digits.as_bytes(), radix)?;
    Some(if negative { -n } else { n })
}

pub(crate) fn int_or_error(
    text: &str,
    parsed: Option<BigInt>,
    on_error: &mut dyn FnMut(String),
) -> Value {
    match parsed {
        Some(n) => Value::Integer(n),
        None => {
            on_error(format!("Invalid integer {}", text));
            Value::String(text.to_string())
        }
    }
}

pub(crate) fn resolve_nan_inf(text: &str, _on_error: &mut dyn FnMut(String)) -> Value {
    if text.ends_with("nan") || text.ends_with("NaN") || text.ends_with("NAN") {
        Value::Float(f64::NAN)
    } else if text.starts_with('-') {
        Value::Float(f64::NEG_INFINITY)
    } else {
        Value::Float(f64::INFINITY)
    }
}

pub(crate) fn resolve_float(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    match cleaned.parse::<f64>() {
        Ok(f) => Value::Float(f),
        Err(_) => {
            on_error(format!("Invalid float {}", text));
            Value::String(text.to_string())
        }
    }
}

// ============================================================================
// Shared stringifiers
// ============================================================================

pub(crate) fn stringify_null(_value: &Value, _format: Option<NumberFormat>) -> String {
    "null".to_string()
}

pub(crate) fn stringify_bool(value: &Value, _format: Option<NumberFormat>) -> String {
    match value {
        Value::Bool(true) => "true".to_string(),
        _ => "false".to_string(),
    }
}

pub(crate) fn stringify_float(value: &Value, format: Option<NumberFormat>) -> String {
    let f = match value {
        Value::Float(f) => *f,
        _ => return String::new(),
    };
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else if format == Some(NumberFormat::Exp) {
        format!("{:e}", f)
    } else {
        // Debug keeps a fraction or exponent, so the text stays a float.
        format!("{:?}", f)
    }
}

/// Write an integer in a radix with a prefix, keeping the sign in front.
pub(crate) fn stringify_radix(n: &BigInt, prefix: &str, radix: u32) -> String {
    let sign = if n.sign() == num_bigint::Sign::Minus { "-" } else { "" };
    format!("{}{}{}", sign, prefix, n.magnitude().to_str_radix(radix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(schema: SchemaName, text: &str) -> Value {
        let schema = Schema::get(schema);
        let tag = schema.resolve_plain(text, false);
        (tag.resolve)(text, &mut |_| {})
    }

    #[test]
    fn test_failsafe_keeps_strings() {
        assert_eq!(plain(SchemaName::Failsafe, "true"), Value::from("true"));
        assert_eq!(plain(SchemaName::Failsafe, "12"), Value::from("12"));
        assert_eq!(plain(SchemaName::Failsafe, ""), Value::from(""));
    }

    #[test]
    fn test_explicit_tag_lookup() {
        let core = Schema::get(SchemaName::Core);
        assert_eq!(core.scalar_tag(INT_TAG, "0x1f").map(|t| t.format), Some(Some(NumberFormat::Hex)));
        assert_eq!(core.scalar_tag(INT_TAG, "12").map(|t| t.format), Some(None));
        assert!(core.scalar_tag("!custom", "x").is_none());
        assert!(core.collection_tag(MAP_TAG).is_some());
        assert!(core.collection_tag(STR_TAG).is_none());
        let tag = core.scalar_tag(FLOAT_TAG, "1").map(|t| (t.resolve)("1", &mut |_| {}));
        assert_eq!(tag, Some(Value::Float(1.0)));
    }

    #[test]
    fn test_parse_int_and_radix() {
        assert_eq!(parse_int("-0x1_F", 2, 16), Some(BigInt::from(-31)));
        assert_eq!(parse_int("+12", 0, 10), Some(BigInt::from(12)));
        assert_eq!(parse_int("0o", 2, 8), None);
        assert_eq!(stringify_radix(&BigInt::from(-255), "0x", 16), "-0xff");
        assert_eq!(short_tag(INT_TAG), "!!int");
        assert_eq!(short_tag("!local"), "!local");
    }

    #[test]
    fn test_float_text() {
        assert_eq!(stringify_float(&Value::Float(1.0), None), "1.0");
        assert_eq!(stringify_float(&Value::Float(f64::NEG_INFINITY), None), "-.inf");
        assert_eq!(stringify_float(&Value::Float(1500.0), Some(NumberFormat::Exp)), "1.5e3");
    }
}
