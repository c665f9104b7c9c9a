//! The YAML 1.2 JSON and core schemas.

use super::*;

static CORE_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:~|[Nn]ull|NULL)?$").unwrap());
static CORE_BOOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[Tt]rue|TRUE|[Ff]alse|FALSE)$").unwrap());
static CORE_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9]+$").unwrap());
static CORE_OCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0o[0-7]+$").unwrap());
static CORE_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap());
static CORE_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?(?:\.[0-9]+|[0-9]+\.[0-9]*)$").unwrap());
static CORE_EXP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)[eE][-+]?[0-9]+$").unwrap()
});
static CORE_NAN_INF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+]?\.(?:inf|Inf|INF)|\.nan|\.NaN|\.NAN)$").unwrap()
});

static JSON_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^null$").unwrap());
static JSON_BOOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:true|false)$").unwrap());
static JSON_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?(?:0|[1-9][0-9]*)$").unwrap());
static JSON_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(?:0|[1-9][0-9]*)(?:\.[0-9]*)?(?:[eE][-+]?[0-9]+)?$").unwrap()
});
static ANYTHING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^").unwrap());

fn resolve_bool(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    match text {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => {
            on_error(format!("Invalid boolean {}", text));
            Value::String(text.to_string())
        }
    }
}

fn resolve_dec(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    int_or_error(text, parse_int(text, 0, 10), on_error)
}

fn resolve_oct(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    int_or_error(text, parse_int(text, 2, 8), on_error)
}

fn resolve_hex(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    int_or_error(text, parse_int(text, 2, 16), on_error)
}

fn stringify_int(value: &Value, format: Option<NumberFormat>) -> String {
    let n = match value {
        Value::Integer(n) => n,
        _ => return String::new(),
    };
    // Core octal and hex have no sign, so negatives stay decimal.
    match format {
        Some(NumberFormat::Oct) if n.sign() != num_bigint::Sign::Minus => {
            stringify_radix(n, "0o", 8)
        }
        Some(NumberFormat::Hex) if n.sign() != num_bigint::Sign::Minus => {
            stringify_radix(n, "0x", 16)
        }
        _ => n.to_string(),
    }
}

fn resolve_json_catch_all(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    on_error(format!("Unresolved plain scalar {:?}", text));
    Value::String(text.to_string())
}

fn is_null(v: &Value) -> bool {
    v.is_null()
}

fn is_bool(v: &Value) -> bool {
    matches!(v, Value::Bool(_))
}

fn is_int(v: &Value) -> bool {
    matches!(v, Value::Integer(_))
}

fn is_float(v: &Value) -> bool {
    matches!(v, Value::Float(_))
}

fn is_bytes(v: &Value) -> bool {
    matches!(v, Value::Bytes(_))
}

/// Integers in hex or octal keep their format when written back.
fn int_tags(dec: &'static Regex, oct: &'static Regex, hex: &'static Regex) -> Vec<TagDescriptor> {
    vec![
        TagDescriptor::new(INT_TAG, TagKind::Scalar)
            .implicit(dec, resolve_dec)
            .identify(is_int)
            .stringify(stringify_int),
        TagDescriptor::new(INT_TAG, TagKind::Scalar)
            .implicit(oct, resolve_oct)
            .format(NumberFormat::Oct)
            .stringify(stringify_int),
        TagDescriptor::new(INT_TAG, TagKind::Scalar)
            .implicit(hex, resolve_hex)
            .format(NumberFormat::Hex)
            .stringify(stringify_int),
    ]
}

pub(super) fn core() -> Schema {
    let mut tags = failsafe_tags();
    tags.push(
        TagDescriptor::new(NULL_TAG, TagKind::Scalar)
            .implicit(&CORE_NULL, resolve_null)
            .identify(is_null)
            .stringify(stringify_null),
    );
    tags.push(
        TagDescriptor::new(BOOL_TAG, TagKind::Scalar)
            .implicit(&CORE_BOOL, resolve_bool)
            .identify(is_bool)
            .stringify(stringify_bool),
    );
    tags.extend(int_tags(&CORE_INT, &CORE_OCT, &CORE_HEX));
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&CORE_FLOAT, resolve_float)
            .identify(is_float)
            .stringify(stringify_float),
    );
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&CORE_EXP, resolve_float)
            .format(NumberFormat::Exp)
            .stringify(stringify_float),
    );
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&CORE_NAN_INF, resolve_nan_inf)
            .stringify(stringify_float),
    );
    // Binary is only reachable through an explicit `!!binary`.
    tags.push(binary_tag());
    Schema {
        name: SchemaName::Core,
        tags,
        merge: false,
    }
}

pub(super) fn json() -> Schema {
    let mut tags = failsafe_tags();
    tags.push(
        TagDescriptor::new(NULL_TAG, TagKind::Scalar)
            .implicit(&JSON_NULL, resolve_null)
            .identify(is_null)
            .stringify(stringify_null),
    );
    tags.push(
        TagDescriptor::new(BOOL_TAG, TagKind::Scalar)
            .implicit(&JSON_BOOL, resolve_bool)
            .identify(is_bool)
            .stringify(stringify_bool),
    );
    tags.push(
        TagDescriptor::new(INT_TAG, TagKind::Scalar)
            .implicit(&JSON_INT, resolve_dec)
            .identify(is_int)
            .stringify(stringify_int),
    );
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&JSON_FLOAT, resolve_float)
            .identify(is_float)
            .stringify(stringify_float),
    );
    tags.push(TagDescriptor::new(STR_TAG, TagKind::Scalar).implicit(&ANYTHING, resolve_json_catch_all));
    Schema {
        name: SchemaName::Json,
        tags,
        merge: false,
    }
}

pub(super) fn binary_tag() -> TagDescriptor {
    let mut tag = TagDescriptor::new(BINARY_TAG, TagKind::Scalar).identify(is_bytes);
    tag.resolve = resolve_binary;
    tag
}

/// Decode base64, ignoring line breaks and other white space.
fn resolve_binary(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    use base64::Engine;
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => Value::Bytes(bytes),
        Err(err) => {
            on_error(format!("Invalid base64 in !!binary: {}", err));
            Value::String(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(schema: &Schema, text: &str) -> (Value, Vec<String>) {
        let mut errors = Vec::new();
        let tag = schema.resolve_plain(text, false);
        let value = (tag.resolve)(text, &mut |msg| errors.push(msg));
        (value, errors)
    }

    #[test]
    fn test_core_scalars() {
        let core = core();
        let cases: Vec<(&str, Value)> = vec![
            ("", Value::Null),
            ("~", Value::Null),
            ("NULL", Value::Null),
            ("True", Value::Bool(true)),
            ("yes", Value::from("yes")),
            ("0o17", Value::from(15i64)),
            ("0x1F", Value::from(31i64)),
            ("-12", Value::from(-12i64)),
            ("012", Value::from(12i64)),
            ("1.5", Value::Float(1.5)),
            ("-.5", Value::Float(-0.5)),
            ("1e3", Value::Float(1000.0)),
            ("-.INF", Value::Float(f64::NEG_INFINITY)),
            ("1_000", Value::from("1_000")),
            ("0b1", Value::from("0b1")),
        ];
        for (text, expected) in cases {
            assert_eq!(plain(&core, text).0, expected, "{:?}", text);
        }
        assert!(plain(&core, ".nan").0.as_float().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_big_integers() {
        let core = core();
        let (value, _) = plain(&core, "123456789012345678901234567890");
        assert_eq!(value.as_integer().map(|n| n.to_string()).as_deref(), Some("123456789012345678901234567890"));
    }

    #[test]
    fn test_json_scalars() {
        let json = json();
        assert_eq!(plain(&json, "null").0, Value::Null);
        assert_eq!(plain(&json, "-0").0, Value::from(0i64));
        assert_eq!(plain(&json, "1.0e5").0, Value::Float(100000.0));
        let (value, errors) = plain(&json, "True");
        assert_eq!(value, Value::from("True"));
        assert_eq!(errors, vec![r#"Unresolved plain scalar "True""#.to_string()]);
        assert_eq!(plain(&json, "").1.len(), 1);
    }

    #[test]
    fn test_binary_and_formats() {
        let core = core();
        let tag = core.scalar_tag(BINARY_TAG, "aGk=").map(|t| (t.resolve)("aGk=\n", &mut |_| {}));
        assert_eq!(tag, Some(Value::Bytes(b"hi".to_vec())));
        let hex = core.resolve_plain("0xff", false);
        assert_eq!(hex.stringify.map(|f| f(&Value::from(255i64), hex.format)).as_deref(), Some("0xff"));
        assert_eq!(stringify_int(&Value::from(-8i64), Some(NumberFormat::Oct)), "-8");
    }
}
