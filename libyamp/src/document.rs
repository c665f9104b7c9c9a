//! The composed document: an arena of nodes with aliases as non-owning
//! handles to their anchored targets.

use crate::directives::Directives;
use crate::error::{ErrorCode, Result, YamlError};
use crate::options::{SchemaName, Version};
use crate::schema::{NumberFormat, Schema, MERGE_TAG};
use crate::value::Value;
use num_bigint::BigInt;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Most collections that may be nested inside each other. Deeper input is
/// reported as an error and replaced with a null.
pub const MAX_DEPTH: usize = 128;

/// A mapping key reduced to what makes it unique. Floats are kept as bits,
/// with `-0.0` folded into `0.0` and every NaN into one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyId {
    Null,
    Bool(bool),
    Integer(BigInt),
    Float(u64),
    String(String),
    Bytes(Vec<u8>),
    Node(NodeId),
}

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// How a scalar was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub value: Value,
    pub style: ScalarStyle,
    pub format: Option<NumberFormat>,
    /// The text the value was resolved from, after folding and escapes.
    pub source: Option<String>,
}

impl Scalar {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            style: ScalarStyle::Plain,
            format: None,
            source: None,
        }
    }
}

/// A reference to an anchored node.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// Anchor name, without the `*`.
    pub source: String,
    pub target: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub key: NodeId,
    pub value: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    pub pairs: Vec<Pair>,
    pub flow: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    pub items: Vec<NodeId>,
    pub flow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Alias(Alias),
    Mapping(Mapping),
    Sequence(Sequence),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub anchor: Option<String>,
    /// Explicit tag, resolved to its full name.
    pub tag: Option<String>,
    /// Start offset, end of the value, and end including a trailing comment.
    pub range: [usize; 3],
    pub comment_before: Option<String>,
    pub comment: Option<String>,
    /// Preceded by a blank line.
    pub space_before: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            anchor: None,
            tag: None,
            range: [0; 3],
            comment_before: None,
            comment: None,
            space_before: false,
        }
    }

    pub fn scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_) | NodeKind::Sequence(_))
    }
}

/// One YAML document with its directives and diagnostics.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    /// Root node; `None` only for documents made from nothing.
    pub contents: Option<NodeId>,
    pub directives: Directives,
    pub schema: SchemaName,
    /// `<<` keys merge.
    pub merge: bool,
    pub errors: Vec<YamlError>,
    pub warnings: Vec<YamlError>,
    pub comment_before: Option<String>,
    pub comment: Option<String>,
    /// Start offset, end of the contents, and end of the document.
    pub range: [usize; 3],
    anchors: Vec<(String, NodeId)>,
}

impl Document {
    pub fn new(directives: Directives, schema: SchemaName, merge: bool) -> Self {
        Self {
            nodes: Vec::new(),
            contents: None,
            directives,
            schema,
            merge,
            errors: Vec::new(),
            warnings: Vec::new(),
            comment_before: None,
            comment: None,
            range: [0; 3],
            anchors: Vec::new(),
        }
    }

    pub fn version(&self) -> Version {
        self.directives.version
    }

    pub fn contents(&self) -> Option<NodeId> {
        self.contents
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bind an anchor name to a node. A later binding of the same name
    /// shadows the earlier one for aliases that follow it.
    pub fn bind_anchor(&mut self, name: &str, id: NodeId) {
        self.anchors.push((name.to_string(), id));
    }

    /// The node most recently bound to an anchor name.
    pub fn anchor(&self, name: &str) -> Option<NodeId> {
        self.anchors
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|&(_, id)| id)
    }

    /// All anchor bindings in document order.
    pub fn anchors(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.anchors.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Follow aliases to the node they refer to.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        let mut id = id;
        // Hand-built trees may chain aliases in a loop.
        for _ in 0..self.nodes.len() {
            match &self.node(id).kind {
                NodeKind::Alias(alias) => id = alias.target,
                _ => break,
            }
        }
        id
    }

    /// Is this node a `<<` merge key?
    pub fn is_merge_key(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.tag.as_deref() == Some(MERGE_TAG) {
            return true;
        }
        self.merge
            && node.tag.is_none()
            && matches!(&node.kind, NodeKind::Scalar(s)
                if s.style == ScalarStyle::Plain && s.value.as_str() == Some("<<"))
    }

    /// What a key is compared by: scalars by value, anything else only by
    /// identity.
    pub fn key_id(&self, id: NodeId) -> KeyId {
        let id = self.resolve(id);
        let Some(scalar) = self.node(id).scalar() else {
            return KeyId::Node(id);
        };
        match &scalar.value {
            Value::Null => KeyId::Null,
            Value::Bool(b) => KeyId::Bool(*b),
            Value::Integer(n) => KeyId::Integer(n.clone()),
            Value::Float(f) if f.is_nan() => KeyId::Float(f64::NAN.to_bits()),
            Value::Float(f) if *f == 0.0 => KeyId::Float(0f64.to_bits()),
            Value::Float(f) => KeyId::Float(f.to_bits()),
            Value::String(s) => KeyId::String(s.clone()),
            Value::Bytes(b) => KeyId::Bytes(b.clone()),
            Value::Sequence(_) | Value::Mapping(_) => KeyId::Node(id),
        }
    }

    /// The pairs of a mapping with merge keys applied: keys written in the
    /// mapping win over merged ones, and earlier merge sources win over
    /// later ones. Non-mappings have no entries.
    pub fn entries(&self, map: NodeId) -> Vec<(NodeId, NodeId)> {
        let mut visiting = Vec::new();
        self.collect_entries(map, &mut visiting)
    }

    fn collect_entries(&self, map: NodeId, visiting: &mut Vec<NodeId>) -> Vec<(NodeId, NodeId)> {
        let map = self.resolve(map);
        let pairs = match &self.node(map).kind {
            NodeKind::Mapping(m) => &m.pairs,
            _ => return Vec::new(),
        };
        if visiting.contains(&map) {
            return Vec::new();
        }
        visiting.push(map);
        let has_merge = pairs.iter().any(|pair| self.is_merge_key(pair.key));
        let explicit: HashSet<KeyId> = if has_merge {
            pairs
                .iter()
                .filter(|pair| !self.is_merge_key(pair.key))
                .map(|pair| self.key_id(pair.key))
                .collect()
        } else {
            HashSet::new()
        };
        let mut entries: Vec<(NodeId, NodeId)> = Vec::with_capacity(pairs.len());
        let mut index: HashMap<KeyId, usize> = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            if has_merge && self.is_merge_key(pair.key) {
                for source in self.merge_sources(pair.value) {
                    for (key, value) in self.collect_entries(source, visiting) {
                        let id = self.key_id(key);
                        if !explicit.contains(&id) && !index.contains_key(&id) {
                            index.insert(id, entries.len());
                            entries.push((key, value));
                        }
                    }
                }
                continue;
            }
            match index.entry(self.key_id(pair.key)) {
                Entry::Occupied(slot) => entries[*slot.get()].1 = pair.value,
                Entry::Vacant(slot) => {
                    slot.insert(entries.len());
                    entries.push((pair.key, pair.value));
                }
            }
        }
        visiting.pop();
        entries
    }

    /// The mappings a `<<` value merges, or `None` if it isn't a mapping
    /// or a sequence of mappings.
    pub fn checked_merge_sources(&self, value: NodeId) -> Option<Vec<NodeId>> {
        let value = self.resolve(value);
        match &self.node(value).kind {
            NodeKind::Mapping(_) => Some(vec![value]),
            NodeKind::Sequence(seq) => seq
                .items
                .iter()
                .map(|&item| {
                    let item = self.resolve(item);
                    matches!(self.node(item).kind, NodeKind::Mapping(_)).then_some(item)
                })
                .collect(),
            _ => None,
        }
    }

    fn merge_sources(&self, value: NodeId) -> Vec<NodeId> {
        self.checked_merge_sources(value).unwrap_or_default()
    }

    /// Look up a key in a mapping's flattened entries.
    pub fn get(&self, map: NodeId, key: impl Into<Value>) -> Option<NodeId> {
        let key = key.into();
        self.entries(map).into_iter().find_map(|(k, v)| {
            let k = self.resolve(k);
            match self.node(k).scalar() {
                Some(scalar) if scalar.value.same_as(&key) => Some(v),
                _ => None,
            }
        })
    }

    /// Plain data for the whole document. Aliases are expanded; an alias
    /// inside the node it refers to is an error.
    pub fn to_value(&self) -> Result<Value> {
        match self.contents {
            Some(id) => self.node_value(id),
            None => Ok(Value::Null),
        }
    }

    /// Plain data for one node.
    pub fn node_value(&self, id: NodeId) -> Result<Value> {
        let mut in_progress = Vec::new();
        self.value_of(id, &mut in_progress)
    }

    fn value_of(&self, id: NodeId, in_progress: &mut Vec<NodeId>) -> Result<Value> {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Scalar(scalar) => Ok(scalar.value.clone()),
            NodeKind::Alias(alias) => {
                if in_progress.contains(&alias.target) {
                    let [start, end, _] = node.range;
                    return Err(YamlError::new(
                        ErrorCode::AliasCycle,
                        start,
                        end,
                        format!("Alias *{} refers to a node that contains it", alias.source),
                    ));
                }
                self.value_of(alias.target, in_progress)
            }
            NodeKind::Sequence(_) | NodeKind::Mapping(_) if in_progress.len() >= MAX_DEPTH => {
                let [start, end, _] = node.range;
                Err(YamlError::new(
                    ErrorCode::NestingTooDeep,
                    start,
                    end,
                    format!("Collections are nested more than {} levels deep", MAX_DEPTH),
                ))
            }
            NodeKind::Sequence(seq) => {
                in_progress.push(id);
                let items = seq
                    .items
                    .iter()
                    .map(|&item| self.value_of(item, in_progress))
                    .collect::<Result<Vec<_>>>()?;
                in_progress.pop();
                Ok(Value::Sequence(items))
            }
            NodeKind::Mapping(_) => {
                in_progress.push(id);
                let mut entries = Vec::new();
                for (key, value) in self.entries(id) {
                    entries.push((self.value_of(key, in_progress)?, self.value_of(value, in_progress)?));
                }
                in_progress.pop();
                Ok(Value::Mapping(entries))
            }
        }
    }

    /// Build a document from plain data, for stringifying.
    pub fn from_value(value: &Value, schema: &Schema) -> Self {
        let directives = Directives::new(match schema.name {
            SchemaName::Yaml11 => Version::V1_1,
            _ => Version::V1_2,
        });
        let mut doc = Document::new(directives, schema.name, false);
        let root = doc.add_value(value, schema, 0);
        doc.contents = Some(root);
        doc
    }

    fn add_value(&mut self, value: &Value, schema: &Schema, depth: usize) -> NodeId {
        let kind = match value {
            Value::Sequence(_) | Value::Mapping(_) if depth >= MAX_DEPTH => {
                tracing::warn!(depth, "collection nested too deep, writing null");
                NodeKind::Scalar(Scalar::new(Value::Null))
            }
            Value::Sequence(items) => {
                let items = items
                    .iter()
                    .map(|item| self.add_value(item, schema, depth + 1))
                    .collect();
                NodeKind::Sequence(Sequence { items, flow: false })
            }
            Value::Mapping(entries) => {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| Pair {
                        key: self.add_value(k, schema, depth + 1),
                        value: self.add_value(v, schema, depth + 1),
                    })
                    .collect();
                NodeKind::Mapping(Mapping { pairs, flow: false })
            }
            scalar => {
                let mut node = Scalar::new(scalar.clone());
                node.format = schema.identify(scalar).format;
                NodeKind::Scalar(node)
            }
        };
        self.add_node(Node::new(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(doc: &mut Document, value: Value) -> NodeId {
        doc.add_node(Node::new(NodeKind::Scalar(Scalar::new(value))))
    }

    fn map(doc: &mut Document, pairs: Vec<(NodeId, NodeId)>) -> NodeId {
        let pairs = pairs.into_iter().map(|(key, value)| Pair { key, value }).collect();
        doc.add_node(Node::new(NodeKind::Mapping(Mapping { pairs, flow: false })))
    }

    fn alias(doc: &mut Document, name: &str) -> NodeId {
        let target = doc.anchor(name).unwrap();
        doc.add_node(Node::new(NodeKind::Alias(Alias {
            source: name.to_string(),
            target,
        })))
    }

    fn new_doc(merge: bool) -> Document {
        Document::new(Directives::new(Version::V1_2), SchemaName::Core, merge)
    }

    #[test]
    fn test_merge_view() {
        // base: &b {a: 1, b: 2}
        // derived: {b: 3, <<: *b, c: 4}
        let mut doc = new_doc(true);
        let (ka, va) = (scalar(&mut doc, "a".into()), scalar(&mut doc, 1i64.into()));
        let (kb, vb) = (scalar(&mut doc, "b".into()), scalar(&mut doc, 2i64.into()));
        let base = map(&mut doc, vec![(ka, va), (kb, vb)]);
        doc.bind_anchor("b", base);
        let (kb2, vb2) = (scalar(&mut doc, "b".into()), scalar(&mut doc, 3i64.into()));
        let merge = scalar(&mut doc, "<<".into());
        let src = alias(&mut doc, "b");
        let (kc, vc) = (scalar(&mut doc, "c".into()), scalar(&mut doc, 4i64.into()));
        let derived = map(&mut doc, vec![(kb2, vb2), (merge, src), (kc, vc)]);
        let (kbase, kderived) = (scalar(&mut doc, "base".into()), scalar(&mut doc, "derived".into()));
        let root = map(&mut doc, vec![(kbase, base), (kderived, derived)]);
        doc.contents = Some(root);

        assert_eq!(doc.get(derived, "b"), Some(vb2));
        assert_eq!(doc.get(derived, "a"), Some(va));
        assert_eq!(doc.get(derived, "zzz"), None);
        let value = doc.to_value().unwrap();
        assert_eq!(
            format!("{:?}", value.get("derived").unwrap()),
            r#"{"b": 3, "a": 1, "c": 4}"#
        );

        doc.merge = false;
        assert_eq!(doc.get(derived, "a"), None);
        assert_eq!(doc.get(derived, "<<"), Some(src));
    }

    #[test]
    fn test_key_ids() {
        let mut doc = new_doc(false);
        let zero = scalar(&mut doc, Value::Float(0.0));
        let neg_zero = scalar(&mut doc, Value::Float(-0.0));
        let nan = scalar(&mut doc, Value::Float(f64::NAN));
        let other_nan = scalar(&mut doc, Value::Float(-f64::NAN));
        let int_one = scalar(&mut doc, 1i64.into());
        let float_one = scalar(&mut doc, Value::Float(1.0));
        assert_eq!(doc.key_id(zero), doc.key_id(neg_zero));
        assert_eq!(doc.key_id(nan), doc.key_id(other_nan));
        assert_ne!(doc.key_id(int_one), doc.key_id(float_one));

        let empty_a = map(&mut doc, vec![]);
        let empty_b = map(&mut doc, vec![]);
        assert_ne!(doc.key_id(empty_a), doc.key_id(empty_b));
        doc.bind_anchor("a", empty_a);
        let to_a = alias(&mut doc, "a");
        assert_eq!(doc.key_id(to_a), KeyId::Node(empty_a));
    }

    #[test]
    fn test_later_pairs_replace_earlier_ones() {
        let mut doc = new_doc(false);
        let (k1, v1) = (scalar(&mut doc, "k".into()), scalar(&mut doc, 1i64.into()));
        let (k2, v2) = (scalar(&mut doc, "j".into()), scalar(&mut doc, 2i64.into()));
        let (k3, v3) = (scalar(&mut doc, "k".into()), scalar(&mut doc, 3i64.into()));
        let root = map(&mut doc, vec![(k1, v1), (k2, v2), (k3, v3)]);
        assert_eq!(doc.entries(root), vec![(k1, v3), (k2, v2)]);
    }

    #[test]
    fn test_alias_cycle_is_an_error() {
        let mut doc = new_doc(false);
        let key = scalar(&mut doc, "self".into());
        let root = map(&mut doc, vec![]);
        doc.bind_anchor("a", root);
        let value = alias(&mut doc, "a");
        if let NodeKind::Mapping(m) = &mut doc.node_mut(root).kind {
            m.pairs.push(Pair { key, value });
        }
        doc.contents = Some(root);
        assert_eq!(doc.resolve(value), root);
        assert_eq!(doc.get(root, "self"), Some(value));
        let err = doc.to_value().unwrap_err();
        assert_eq!(err.code, ErrorCode::AliasCycle);
    }

    #[test]
    fn test_anchor_rebinding() {
        let mut doc = new_doc(false);
        let first = scalar(&mut doc, 1i64.into());
        doc.bind_anchor("x", first);
        let second = scalar(&mut doc, 2i64.into());
        doc.bind_anchor("x", second);
        assert_eq!(doc.anchor("x"), Some(second));
        assert_eq!(doc.anchors().count(), 2);
        assert_eq!(doc.anchor("y"), None);
    }

    #[test]
    fn test_from_value() {
        let value = Value::Mapping(vec![
            ("k".into(), Value::Sequence(vec![1i64.into(), Value::Null])),
        ]);
        let doc = Document::from_value(&value, Schema::get(SchemaName::Core));
        assert!(doc.to_value().unwrap().same_as(&value));
        assert_eq!(doc.len(), 5);
    }
}
