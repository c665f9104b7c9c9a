//! End-to-end properties of the lexer, parser, composer and stringifier.

use libyamp::{
    cst, parse_all_documents, parse_cst, parse_document, parse_value, stringify, stringify_value, Document,
    DuplicateKeys, ErrorCode, NodeId, NodeKind, ParseOptions, StreamParser, StringifyOptions, Value, Version,
    MAX_DEPTH,
};

fn s(text: &str) -> Value {
    Value::String(text.to_string())
}

fn value(source: &str) -> Value {
    parse_value(source, ParseOptions::default()).unwrap()
}

/// Value nodes of the root mapping, in order, aliases not followed.
fn root_values(doc: &Document) -> Vec<NodeId> {
    let root = doc.contents.unwrap();
    match &doc.node(root).kind {
        NodeKind::Mapping(map) => map.pairs.iter().map(|pair| pair.value).collect(),
        other => panic!("expected a mapping, got {:?}", other),
    }
}

const SOURCES: &[&str] = &[
    "",
    "plain\n",
    "# only a comment\n",
    "a: 1\nb:\n  - x\n  - {y: z}\n",
    "--- !!map\n? complex\n: value\n...\n",
    "%YAML 1.1\n%TAG !e! tag:example.com,2000:\n---\n!e!thing &a [*a, 'q''s', \"esc\\t\"]\n",
    "|+\n  keep\n\n>-\n  folded\n",
    "a: [1, 2\nb: }\n",
    "\t- tab\n- ok\n",
    "key: \"unterminated\n",
    "\u{feff}- bom\n",
    " ]",
    "!}",
    "\t}",
    "]\n}",
];

#[test]
fn test_cst_reproduces_source() {
    for source in SOURCES {
        assert_eq!(&cst::stringify(&parse_cst(source)), source, "source {:?}", source);
    }
}

#[test]
fn test_cst_nodes_tile_source() {
    for source in SOURCES {
        let nodes = parse_cst(source);
        let mut offset = 0;
        for node in &nodes {
            let text = cst::stringify(std::slice::from_ref(node));
            assert_eq!(node.offset(), offset, "node {:?} in {:?}", node, source);
            assert_eq!(&source[offset..offset + text.len()], text);
            offset += text.len();
        }
        assert_eq!(offset, source.len());
    }
}

#[test]
fn test_block_sequence() {
    assert_eq!(value("- one\n- two\n- three\n"), Value::Sequence(vec![s("one"), s("two"), s("three")]));
}

#[test]
fn test_folded_scalar() {
    assert_eq!(value(">\n  folded\n  text\n\n"), s("folded text\n"));
    assert_eq!(value(">\n  a\n\n  b\n"), s("a\nb\n"));
}

#[test]
fn test_chomping() {
    assert_eq!(value("|+\nblock\n\n"), s("block\n\n"));
    assert_eq!(value("|-\nblock\n\n"), s("block"));
    assert_eq!(value("|\nblock\n\n"), s("block\n"));
}

#[test]
fn test_alias_identity_survives_round_trip() {
    let doc = parse_document("a: &x 1\nb: *x\n", ParseOptions::default());
    assert!(doc.errors.is_empty());
    let text = stringify(&doc, &StringifyOptions::default());
    assert_eq!(text, "a: &x 1\nb: *x\n");

    let again = parse_document(&text, ParseOptions::default());
    let values = root_values(&again);
    assert!(matches!(again.node(values[1]).kind, NodeKind::Alias(_)));
    assert_eq!(again.resolve(values[1]), values[0]);
    assert_eq!(again.anchor("x"), Some(values[0]));
}

#[test]
fn test_stringify_parse_inverse() {
    let sources = [
        "- one\n- two\n- three\n",
        "base: &b\n  k: v\nlist:\n  - *b\n  - [1, 2.5, null, true]\n",
        "text: |\n  line\n   indented\nfold: >\n  a b\n",
        "quoted: ['true', \"\\u0007\", '', ' lead']\n",
        "? [complex, key]\n: value\n",
        "%YAML 1.1\n---\non: off\nhex: 0x1F\n",
    ];
    for source in sources {
        let doc = parse_document(source, ParseOptions::default());
        assert!(doc.errors.is_empty(), "{:?}: {:?}", source, doc.errors);
        let text = stringify(&doc, &StringifyOptions::default());
        let again = parse_document(&text, ParseOptions::default());
        assert!(again.errors.is_empty(), "{:?} -> {:?}: {:?}", source, text, again.errors);
        assert!(
            doc.to_value().unwrap().same_as(&again.to_value().unwrap()),
            "{:?} -> {:?}",
            source,
            text
        );
    }
}

#[test]
fn test_stringified_strings_read_back() {
    let opts = StringifyOptions::default();
    for text in ["  \n  ", "a\n\t", "x\n  \n", "\n\n", " \n", "a\n b\n", "line\n  indented\n"] {
        let value = Value::Mapping(vec![(s("k"), s(text))]);
        let yaml = stringify_value(&value, &opts);
        assert_eq!(parse_value(&yaml, ParseOptions::default()).unwrap(), value, "{:?}", yaml);
    }
}

#[test]
fn test_documents_are_independent() {
    let docs = parse_all_documents(
        "%YAML 1.2\n---\nfoo\n...\n%YAML 1.2\n---\nbar\n",
        ParseOptions::default(),
    );
    assert_eq!(docs.len(), 2);
    for (doc, expected) in docs.iter().zip(["foo", "bar"]) {
        assert!(doc.errors.is_empty());
        assert_eq!(doc.version(), Version::V1_2);
        assert_eq!(doc.anchors().count(), 0);
        assert_eq!(doc.to_value().unwrap(), s(expected));
    }
}

#[test]
fn test_anchors_do_not_cross_documents() {
    let docs = parse_all_documents("a: &x 1\n---\nb: *x\n", ParseOptions::default());
    assert_eq!(docs.len(), 2);
    assert!(docs[0].errors.is_empty());
    assert_eq!(docs[1].errors.len(), 1);
}

#[test]
fn test_indentation_boundary() {
    assert_eq!(value("- a\n  b\n- c\n"), Value::Sequence(vec![s("a b"), s("c")]));
    assert_eq!(
        value("- - a\n  - b\n- c\n"),
        Value::Sequence(vec![Value::Sequence(vec![s("a"), s("b")]), s("c")])
    );
    assert_eq!(
        value("-\n  k: v\n- x\n"),
        Value::Sequence(vec![Value::Mapping(vec![(s("k"), s("v"))]), s("x")])
    );
}

#[test]
fn test_error_isolation() {
    let docs = parse_all_documents("a: *nope\n---\nb: 2\n", ParseOptions::default());
    assert_eq!(docs.len(), 2);
    assert!(!docs[0].errors.is_empty());
    assert!(docs[1].errors.is_empty());
    assert_eq!(
        docs[1].to_value().unwrap(),
        Value::Mapping(vec![(s("b"), Value::from(2i64))])
    );
}

#[test]
fn test_anchor_redefinition() {
    let doc = parse_document("a: &x 1\nb: *x\nc: &x 2\nd: *x\n", ParseOptions::default());
    assert!(doc.errors.is_empty());
    let values = root_values(&doc);
    assert_eq!(doc.resolve(values[1]), values[0]);
    assert_eq!(doc.resolve(values[3]), values[2]);
    assert_eq!(
        doc.to_value().unwrap(),
        Value::Mapping(vec![
            (s("a"), Value::from(1i64)),
            (s("b"), Value::from(1i64)),
            (s("c"), Value::from(2i64)),
            (s("d"), Value::from(2i64)),
        ])
    );
}

#[test]
fn test_chunked_feeding_matches_whole() {
    let source = "# lead\na: &a [1, 2]\nb: |\n  text\n---\n- *a\n- \"q\"\n...\nbad: *missing\n";
    let whole = parse_all_documents(source, ParseOptions::default());
    for size in [1, 2, 5, 13] {
        let mut stream = StreamParser::new(ParseOptions::default());
        let mut docs = Vec::new();
        for chunk in source.as_bytes().chunks(size) {
            docs.extend(stream.feed(std::str::from_utf8(chunk).unwrap()));
        }
        docs.extend(stream.finish());
        assert_eq!(docs.len(), whole.len(), "chunk size {}", size);
        for (a, b) in docs.iter().zip(&whole) {
            assert_eq!(a.errors, b.errors, "chunk size {}", size);
            assert_eq!(a.to_value().ok(), b.to_value().ok(), "chunk size {}", size);
        }
    }
}

#[test]
fn test_documents_arrive_before_finish() {
    let mut stream = StreamParser::new(ParseOptions::default());
    let mut docs = stream.feed("a: 1\n");
    assert!(docs.is_empty());
    docs.extend(stream.feed("...\n"));
    docs.extend(stream.feed("b: 2\n"));
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].to_value().unwrap(), Value::Mapping(vec![(s("a"), Value::from(1i64))]));
    assert_eq!(stream.finish().len(), 1);
}

fn depth_of(value: &Value) -> usize {
    match value {
        Value::Sequence(items) => 1 + items.iter().map(depth_of).max().unwrap_or(0),
        Value::Mapping(entries) => 1 + entries.iter().map(|(_, v)| depth_of(v)).max().unwrap_or(0),
        _ => 0,
    }
}

#[test]
fn test_deep_nesting_is_an_error() {
    for source in ["[".repeat(1000), format!("{}x\n", "- ".repeat(2000))] {
        let doc = parse_document(&source, ParseOptions::default());
        assert!(
            doc.errors.iter().any(|e| e.code == ErrorCode::NestingTooDeep),
            "{:?}",
            doc.errors
        );
        let value = doc.to_value().unwrap();
        assert_eq!(depth_of(&value), MAX_DEPTH);
        let text = stringify(&doc, &StringifyOptions::default());
        assert!(parse_document(&text, ParseOptions::default()).errors.is_empty());
    }
}

#[test]
fn test_deep_alias_expansion_is_an_error() {
    let mut source = String::from("a0: &a0 [x]\n");
    for i in 1..200 {
        source.push_str(&format!("a{}: &a{} [*a{}]\n", i, i, i - 1));
    }
    let doc = parse_document(&source, ParseOptions::default());
    assert!(doc.errors.is_empty());
    assert_eq!(doc.to_value().unwrap_err().code, ErrorCode::NestingTooDeep);
}

#[test]
fn test_deep_value_is_cut_when_stringified() {
    let mut value = s("leaf");
    for _ in 0..300 {
        value = Value::Sequence(vec![value]);
    }
    let text = stringify_value(&value, &StringifyOptions::default());
    let again = parse_value(&text, ParseOptions::default()).unwrap();
    assert_eq!(depth_of(&again), MAX_DEPTH);
}

#[test]
fn test_large_mapping() {
    let mut source: String = (0..20_000).map(|i| format!("key{}: {}\n", i, i)).collect();
    source.push_str("key0: again\n");
    let doc = parse_document(&source, ParseOptions::default());
    assert_eq!(doc.errors.len(), 1);
    assert_eq!(doc.errors[0].code, ErrorCode::DuplicateKey);
    let value = doc.to_value().unwrap();
    let entries = value.as_mapping().unwrap();
    assert_eq!(entries.len(), 20_000);
    assert_eq!(entries[0], (s("key0"), s("again")));
}

#[test]
fn test_merge_from_a_list_of_sources() {
    let source = "a: &a {x: 1, y: 1}\nb: &b {y: 2, z: 2}\nc:\n  <<: [*a, *b]\n  z: 3\n";
    let doc = parse_document(source, ParseOptions::default().with_merge_keys(true));
    assert!(doc.errors.is_empty(), "{:?}", doc.errors);
    let c = root_values(&doc)[2];
    let int = |id: Option<NodeId>| doc.node(id.unwrap()).scalar().unwrap().value.clone();
    assert_eq!(int(doc.get(c, "x")), Value::from(1i64));
    assert_eq!(int(doc.get(c, "y")), Value::from(1i64));
    assert_eq!(int(doc.get(c, "z")), Value::from(3i64));

    let plain = parse_value(source, ParseOptions::default()).unwrap();
    assert_eq!(plain.get("c").unwrap().as_mapping().unwrap().len(), 2);
}

#[test]
fn test_bad_merge_source() {
    let doc = parse_document("a:\n  <<: [{x: 1}, 2]\n", ParseOptions::default().with_merge_keys(true));
    assert_eq!(doc.errors.len(), 1);
    assert_eq!(doc.errors[0].code, ErrorCode::BadMergeSource);
}

#[test]
fn test_duplicate_key_modes() {
    let source = "a: 1\na: 2\n";
    let doc = parse_document(source, ParseOptions::default().with_duplicate_keys(DuplicateKeys::Warning));
    assert!(doc.errors.is_empty());
    assert_eq!(doc.warnings.len(), 1);
    assert_eq!(doc.warnings[0].code, ErrorCode::DuplicateKey);
    assert_eq!(doc.to_value().unwrap(), Value::Mapping(vec![(s("a"), Value::from(2i64))]));

    let doc = parse_document(source, ParseOptions::default().with_duplicate_keys(DuplicateKeys::Allow));
    assert!(doc.errors.is_empty() && doc.warnings.is_empty());

    let doc = parse_document(source, ParseOptions::default());
    assert_eq!(doc.errors[0].code, ErrorCode::DuplicateKey);
}
