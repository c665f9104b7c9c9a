//! The YAML 1.1 types: yes/no booleans, binary, octal and sexagesimal
//! integers, `_` digit separators, `!!binary`, `<<` merge keys, and the
//! `!!set`, `!!omap` and `!!pairs` collections.

use super::*;
use num_traits::Zero;

static NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:~|[Nn]ull|NULL)?$").unwrap());
static TRUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Y|y|[Yy]es|YES|[Tt]rue|TRUE|[Oo]n|ON)$").unwrap());
static FALSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:N|n|[Nn]o|NO|[Ff]alse|FALSE|[Oo]ff|OFF)$").unwrap());
static INT_BIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0b[01_]+$").unwrap());
static INT_OCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0[0-7_]+$").unwrap());
static INT_DEC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9][0-9_]*$").unwrap());
static INT_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0x[0-9a-fA-F_]+$").unwrap());
static INT_SEXAGESIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(?:[0-9][0-9_]*\.[0-9_]*|\.[0-9][0-9_]*)$").unwrap()
});
static FLOAT_EXP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(?:[0-9][0-9_]*(?:\.[0-9_]*)?|\.[0-9][0-9_]*)[eE][-+]?[0-9]+$").unwrap()
});
static FLOAT_NAN_INF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+]?\.(?:inf|Inf|INF)|\.nan|\.NaN|\.NAN)$").unwrap()
});
static FLOAT_SEXAGESIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*$").unwrap());
static MERGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<<$").unwrap());

fn resolve_true(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    if TRUE.is_match(text) {
        Value::Bool(true)
    } else {
        resolve_false(text, on_error)
    }
}

fn resolve_false(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    if FALSE.is_match(text) {
        Value::Bool(false)
    } else if TRUE.is_match(text) {
        Value::Bool(true)
    } else {
        on_error(format!("Invalid boolean {}", text));
        Value::String(text.to_string())
    }
}

fn resolve_bin(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    int_or_error(text, parse_int(text, 2, 2), on_error)
}

fn resolve_oct(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    int_or_error(text, parse_int(text, 1, 8), on_error)
}

fn resolve_dec(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    int_or_error(text, parse_int(text, 0, 10), on_error)
}

fn resolve_hex(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    int_or_error(text, parse_int(text, 2, 16), on_error)
}

/// Base 60 integer: `190:20:30` is 190 * 3600 + 20 * 60 + 30.
fn resolve_int_sexagesimal(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    let (negative, rest) = split_sign(text);
    let mut total = BigInt::zero();
    for part in rest.split(':') {
        match parse_int(part, 0, 10) {
            Some(n) => total = total * 60 + n,
            None => return int_or_error(text, None, on_error),
        }
    }
    Value::Integer(if negative { -total } else { total })
}

fn resolve_float_sexagesimal(text: &str, on_error: &mut dyn FnMut(String)) -> Value {
    let (negative, rest) = split_sign(text);
    let mut total = 0.0;
    for part in rest.split(':') {
        let cleaned: String = part.chars().filter(|&c| c != '_').collect();
        match cleaned.parse::<f64>() {
            Ok(f) => total = total * 60.0 + f,
            Err(_) => {
                on_error(format!("Invalid float {}", text));
                return Value::String(text.to_string());
            }
        }
    }
    Value::Float(if negative { -total } else { total })
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn stringify_int(value: &Value, format: Option<NumberFormat>) -> String {
    let n = match value {
        Value::Integer(n) => n,
        _ => return String::new(),
    };
    match format {
        Some(NumberFormat::Bin) => stringify_radix(n, "0b", 2),
        Some(NumberFormat::Oct) => stringify_radix(n, "0", 8),
        Some(NumberFormat::Hex) => stringify_radix(n, "0x", 16),
        Some(NumberFormat::Sexagesimal) => stringify_sexagesimal(n),
        _ => n.to_string(),
    }
}

fn stringify_sexagesimal(n: &BigInt) -> String {
    let sign = if n.sign() == num_bigint::Sign::Minus { "-" } else { "" };
    let sixty = num_bigint::BigUint::from(60u32);
    let seconds = n.magnitude() % &sixty;
    let minutes = n.magnitude() / &sixty;
    let head = if minutes >= sixty {
        format!("{}:{:0>2}", &minutes / &sixty, (&minutes % &sixty).to_string())
    } else {
        minutes.to_string()
    };
    format!("{}{}:{:0>2}", sign, head, seconds.to_string())
}

fn resolve_merge(text: &str, _on_error: &mut dyn FnMut(String)) -> Value {
    Value::String(text.to_string())
}

fn int(test: &'static Regex, resolve: ResolveFn, format: Option<NumberFormat>) -> TagDescriptor {
    let tag = TagDescriptor::new(INT_TAG, TagKind::Scalar)
        .implicit(test, resolve)
        .stringify(stringify_int);
    match format {
        Some(format) => tag.format(format),
        None => tag.identify(|v| matches!(v, Value::Integer(_))),
    }
}

pub(super) fn schema() -> Schema {
    let mut tags = failsafe_tags();
    tags.push(
        TagDescriptor::new(NULL_TAG, TagKind::Scalar)
            .implicit(&NULL, resolve_null)
            .identify(Value::is_null)
            .stringify(stringify_null),
    );
    tags.push(
        TagDescriptor::new(BOOL_TAG, TagKind::Scalar)
            .implicit(&TRUE, resolve_true)
            .identify(|v| matches!(v, Value::Bool(_)))
            .stringify(stringify_bool),
    );
    tags.push(
        TagDescriptor::new(BOOL_TAG, TagKind::Scalar)
            .implicit(&FALSE, resolve_false)
            .stringify(stringify_bool),
    );
    tags.push(int(&INT_BIN, resolve_bin, Some(NumberFormat::Bin)));
    tags.push(int(&INT_OCT, resolve_oct, Some(NumberFormat::Oct)));
    tags.push(int(&INT_DEC, resolve_dec, None));
    tags.push(int(&INT_HEX, resolve_hex, Some(NumberFormat::Hex)));
    tags.push(int(
        &INT_SEXAGESIMAL,
        resolve_int_sexagesimal,
        Some(NumberFormat::Sexagesimal),
    ));
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&FLOAT, resolve_float)
            .identify(|v| matches!(v, Value::Float(_)))
            .stringify(stringify_float),
    );
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&FLOAT_EXP, resolve_float)
            .format(NumberFormat::Exp)
            .stringify(stringify_float),
    );
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&FLOAT_NAN_INF, resolve_nan_inf)
            .stringify(stringify_float),
    );
    tags.push(
        TagDescriptor::new(FLOAT_TAG, TagKind::Scalar)
            .implicit(&FLOAT_SEXAGESIMAL, resolve_float_sexagesimal)
            .stringify(stringify_float),
    );
    tags.push(yaml12::binary_tag());
    let mut merge = TagDescriptor::new(MERGE_TAG, TagKind::Scalar).implicit(&MERGE, resolve_merge);
    merge.default = Implicit::KeyOnly;
    tags.push(merge);
    tags.push(TagDescriptor::new(SET_TAG, TagKind::Mapping));
    tags.push(TagDescriptor::new(OMAP_TAG, TagKind::Sequence));
    tags.push(TagDescriptor::new(PAIRS_TAG, TagKind::Sequence));
    Schema {
        name: SchemaName::Yaml11,
        tags,
        merge: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Value {
        let schema = schema();
        let tag = schema.resolve_plain(text, false);
        (tag.resolve)(text, &mut |_| {})
    }

    #[test]
    fn test_yaml11_scalars() {
        assert_eq!(plain("yes"), Value::Bool(true));
        assert_eq!(plain("Off"), Value::Bool(false));
        assert_eq!(plain("y"), Value::Bool(true));
        assert_eq!(plain("0b1010"), Value::from(10i64));
        assert_eq!(plain("012"), Value::from(10i64));
        assert_eq!(plain("08"), Value::from(8i64));
        assert_eq!(plain("1_000"), Value::from(1000i64));
        assert_eq!(plain("-0x_ff"), Value::from(-255i64));
        assert_eq!(plain("190:20:30"), Value::from(685230i64));
        assert_eq!(plain("1_0.5"), Value::Float(10.5));
        assert_eq!(plain("1."), Value::Float(1.0));
        assert_eq!(plain("20:30.15"), Value::Float(1230.15));
        assert_eq!(plain("."), Value::from("."));
        assert_eq!(plain("0o17"), Value::from("0o17"));
    }

    #[test]
    fn test_merge_key_only_at_key() {
        let schema = schema();
        assert_eq!(schema.resolve_plain("<<", true).tag, MERGE_TAG);
        assert_eq!(schema.resolve_plain("<<", false).tag, STR_TAG);
    }

    #[test]
    fn test_stringify_formats() {
        assert_eq!(stringify_int(&Value::from(685230i64), Some(NumberFormat::Sexagesimal)), "190:20:30");
        assert_eq!(stringify_int(&Value::from(10i64), Some(NumberFormat::Oct)), "012");
        assert_eq!(stringify_int(&Value::from(-5i64), Some(NumberFormat::Bin)), "-0b101");
        assert_eq!(stringify_int(&Value::from(70i64), Some(NumberFormat::Sexagesimal)), "1:10");
    }
}
