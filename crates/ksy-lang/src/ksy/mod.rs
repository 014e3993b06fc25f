// YAML surface syntax: spec structs mirroring the .ksy document shape
//
// These types model the document exactly as written; translation into the
// schema AST lives in `parse`. Custom serde impls handle the polymorphic
// shapes (scalar-or-map endian, scalar-or-sequence byte literals, ordered
// name-keyed maps) so that declaration order survives into the AST.

mod parse;

pub use parse::{parse_schema, schema_to_spec, spec_to_schema};

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A name-keyed YAML mapping that preserves declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderedMap<T>(pub Vec<(String, T)>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V<T>(std::marker::PhantomData<T>);
        impl<'de, T: Deserialize<'de>> Visitor<'de> for V<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(key) = map.next_key::<serde_yaml::Value>()? {
                    let key = yaml_key_to_string(&key).map_err(de::Error::custom)?;
                    entries.push((key, map.next_value()?));
                }
                Ok(OrderedMap(entries))
            }
        }
        deserializer.deserialize_map(V(std::marker::PhantomData))
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<T> OrderedMap<T> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Render a YAML mapping key as expression text. Case keys of type switches
/// and endian switches are expressions and may appear as strings, numbers,
/// booleans, or flow sequences of numbers.
pub(crate) fn yaml_key_to_string(value: &serde_yaml::Value) -> Result<String, String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Sequence(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(yaml_key_to_string(item)?);
            }
            Ok(format!("[{}]", parts.join(", ")))
        }
        other => Err(format!("unsupported mapping key {:?}", other)),
    }
}

/// The root document and every nested `types:` entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeSpec {
    #[serde(default, skip_serializing_if = "MetaSpec::is_empty")]
    pub meta: MetaSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seq: Vec<AttributeSpec>,
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub types: OrderedMap<TypeSpec>,
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub enums: OrderedMap<EnumValuesSpec>,
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub instances: OrderedMap<AttributeSpec>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(
        rename = "doc-ref",
        default,
        skip_serializing_if = "MultiString::is_empty"
    )]
    pub doc_ref: MultiString,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetaSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encoding: String,
    #[serde(default, skip_serializing_if = "EndianSpec::is_empty")]
    pub endian: EndianSpec,
    #[serde(
        rename = "bit-endian",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub bit_endian: String,
}

impl MetaSpec {
    fn is_empty(&self) -> bool {
        self == &MetaSpec::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub r#enum: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(
        rename = "doc-ref",
        default,
        skip_serializing_if = "MultiString::is_empty"
    )]
    pub doc_ref: MultiString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<ByteSpec>,
    #[serde(default, skip_serializing_if = "AttrTypeSpec::is_empty")]
    pub r#type: AttrTypeSpec,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repeat: String,
    #[serde(
        rename = "repeat-expr",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub repeat_expr: String,
    #[serde(
        rename = "repeat-until",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub repeat_until: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub r#if: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub size: String,
    #[serde(rename = "size-eos", default, skip_serializing_if = "is_false")]
    pub size_eos: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub process: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub r#enum: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminator: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consume: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<bool>,
    #[serde(rename = "eos-error", default, skip_serializing_if = "Option::is_none")]
    pub eos_error: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pos: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub io: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// `endian: le`, `endian: be`, or `endian: {switch-on: ..., cases: {...}}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndianSpec {
    pub value: String,
    pub switch_on: String,
    pub cases: Vec<(String, String)>,
}

impl EndianSpec {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.switch_on.is_empty() && self.cases.is_empty()
    }
}

impl<'de> Deserialize<'de> for EndianSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = EndianSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an endian literal or a switch mapping")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(EndianSpec {
                    value: v.to_string(),
                    ..Default::default()
                })
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut spec = EndianSpec::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "switch-on" => spec.switch_on = map.next_value()?,
                        "cases" => {
                            let cases: serde_yaml::Mapping = map.next_value()?;
                            for (k, v) in &cases {
                                let k = yaml_key_to_string(k).map_err(de::Error::custom)?;
                                let v = v
                                    .as_str()
                                    .ok_or_else(|| de::Error::custom("endian case must be a string"))?
                                    .to_string();
                                spec.cases.push((k, v));
                            }
                        }
                        other => {
                            return Err(de::Error::custom(format!(
                                "unknown endian key {:?}",
                                other
                            )))
                        }
                    }
                }
                Ok(spec)
            }
        }
        deserializer.deserialize_any(V)
    }
}

impl Serialize for EndianSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.value.is_empty() {
            return serializer.serialize_str(&self.value);
        }
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("switch-on", &self.switch_on)?;
        let cases: OrderedMap<String> = OrderedMap(self.cases.clone());
        map.serialize_entry("cases", &cases)?;
        map.end()
    }
}

/// `type: u4` or `type: {switch-on: ..., cases: {...}}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttrTypeSpec {
    pub value: String,
    pub switch_on: String,
    pub cases: Vec<(String, String)>,
}

impl AttrTypeSpec {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.switch_on.is_empty() && self.cases.is_empty()
    }
}

impl<'de> Deserialize<'de> for AttrTypeSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = AttrTypeSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a type name or a switch mapping")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(AttrTypeSpec {
                    value: v.to_string(),
                    ..Default::default()
                })
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut spec = AttrTypeSpec::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "switch-on" => spec.switch_on = map.next_value()?,
                        "cases" => {
                            let cases: serde_yaml::Mapping = map.next_value()?;
                            for (k, v) in &cases {
                                let k = yaml_key_to_string(k).map_err(de::Error::custom)?;
                                let v = v
                                    .as_str()
                                    .ok_or_else(|| de::Error::custom("type case must be a string"))?
                                    .to_string();
                                spec.cases.push((k, v));
                            }
                        }
                        other => {
                            return Err(de::Error::custom(format!("unknown type key {:?}", other)))
                        }
                    }
                }
                Ok(spec)
            }
        }
        deserializer.deserialize_any(V)
    }
}

impl Serialize for AttrTypeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.value.is_empty() {
            return serializer.serialize_str(&self.value);
        }
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("switch-on", &self.switch_on)?;
        let cases: OrderedMap<String> = OrderedMap(self.cases.clone());
        map.serialize_entry("cases", &cases)?;
        map.end()
    }
}

/// A byte literal: a scalar string/int or a sequence mixing both, e.g.
/// `contents: [0x7f, "ELF"]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ByteSpec(pub Vec<u8>);

impl<'de> Deserialize<'de> for ByteSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = ByteSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a byte literal")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(ByteSpec(v.as_bytes().to_vec()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                u8::try_from(v)
                    .map(|b| ByteSpec(vec![b]))
                    .map_err(|_| de::Error::custom(format!("byte value {} out of range", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u8::try_from(v)
                    .map(|b| ByteSpec(vec![b]))
                    .map_err(|_| de::Error::custom(format!("byte value {} out of range", v)))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = Vec::new();
                while let Some(item) = seq.next_element::<serde_yaml::Value>()? {
                    match item {
                        serde_yaml::Value::String(s) => bytes.extend_from_slice(s.as_bytes()),
                        serde_yaml::Value::Number(n) => {
                            let v = n
                                .as_u64()
                                .and_then(|v| u8::try_from(v).ok())
                                .ok_or_else(|| {
                                    de::Error::custom(format!("byte value {} out of range", n))
                                })?;
                            bytes.push(v);
                        }
                        other => {
                            return Err(de::Error::custom(format!(
                                "unexpected contents element {:?}",
                                other
                            )))
                        }
                    }
                }
                Ok(ByteSpec(bytes))
            }
        }
        deserializer.deserialize_any(V)
    }
}

impl Serialize for ByteSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for b in &self.0 {
            seq.serialize_element(b)?;
        }
        seq.end()
    }
}

/// A scalar string or a list of strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiString(pub Vec<String>);

impl MultiString {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for MultiString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = MultiString;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or list of strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(MultiString(vec![v.to_string()]))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    items.push(item);
                }
                Ok(MultiString(items))
            }
        }
        deserializer.deserialize_any(V)
    }
}

impl Serialize for MultiString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.len() == 1 {
            serializer.serialize_str(&self.0[0])
        } else {
            self.0.serialize(serializer)
        }
    }
}

/// One enum's value table: integer-or-hex keys mapping to identifiers
/// (or to `{id: ..., doc: ...}` maps).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumValuesSpec(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for EnumValuesSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = EnumValuesSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of values to identifiers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut values = Vec::new();
                while let Some(key) = map.next_key::<serde_yaml::Value>()? {
                    let key = yaml_key_to_string(&key).map_err(de::Error::custom)?;
                    let value: serde_yaml::Value = map.next_value()?;
                    let id = match &value {
                        serde_yaml::Value::String(s) => s.clone(),
                        serde_yaml::Value::Mapping(m) => m
                            .get("id")
                            .and_then(|v| v.as_str())
                            .ok_or_else(|| de::Error::custom("enum value map missing id"))?
                            .to_string(),
                        other => {
                            return Err(de::Error::custom(format!(
                                "unexpected enum value {:?}",
                                other
                            )))
                        }
                    };
                    values.push((key, id));
                }
                Ok(EnumValuesSpec(values))
            }
        }
        deserializer.deserialize_map(V)
    }
}

impl Serialize for EnumValuesSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (value, id) in &self.0 {
            map.serialize_entry(value, id)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_type_plain() {
        let spec: AttributeSpec = serde_yaml::from_str("{id: x, type: u4le}").unwrap();
        assert_eq!(spec.r#type.value, "u4le");
        assert!(spec.r#type.switch_on.is_empty());
    }

    #[test]
    fn test_attr_type_switch_preserves_case_order() {
        let spec: AttributeSpec = serde_yaml::from_str(
            "id: body\ntype:\n  switch-on: kind\n  cases:\n    2: beta\n    1: alpha\n",
        )
        .unwrap();
        assert_eq!(spec.r#type.switch_on, "kind");
        assert_eq!(
            spec.r#type.cases,
            vec![("2".into(), "beta".into()), ("1".into(), "alpha".into())]
        );
    }

    #[test]
    fn test_endian_scalar_and_switch() {
        let meta: MetaSpec = serde_yaml::from_str("{id: m, endian: le}").unwrap();
        assert_eq!(meta.endian.value, "le");

        let meta: MetaSpec = serde_yaml::from_str(
            "id: m\nendian:\n  switch-on: _root.marker\n  cases:\n    '[0x49, 0x49]': le\n    '[0x4d, 0x4d]': be\n",
        )
        .unwrap();
        assert_eq!(meta.endian.switch_on, "_root.marker");
        assert_eq!(meta.endian.cases.len(), 2);
        assert_eq!(meta.endian.cases[0], ("[0x49, 0x49]".into(), "le".into()));
    }

    #[test]
    fn test_endian_sequence_case_key() {
        // Unquoted flow sequences are legal YAML keys.
        let meta: MetaSpec = serde_yaml::from_str(
            "id: m\nendian:\n  switch-on: marker\n  cases:\n    ? [0x49, 0x49]\n    : le\n",
        )
        .unwrap();
        assert_eq!(meta.endian.cases[0].0, "[73, 73]");
    }

    #[test]
    fn test_byte_spec_forms() {
        let a: AttributeSpec =
            serde_yaml::from_str("{id: m, contents: [0x7f, \"ELF\"]}").unwrap();
        assert_eq!(a.contents.unwrap().0, vec![0x7f, b'E', b'L', b'F']);

        let a: AttributeSpec = serde_yaml::from_str("{id: m, contents: \"hi\"}").unwrap();
        assert_eq!(a.contents.unwrap().0, b"hi".to_vec());

        let a: AttributeSpec = serde_yaml::from_str("{id: m, contents: 255}").unwrap();
        assert_eq!(a.contents.unwrap().0, vec![0xff]);
    }

    #[test]
    fn test_enums_preserve_order_and_hex() {
        let spec: TypeSpec = serde_yaml::from_str(
            "enums:\n  kind:\n    0x10: high\n    1: low\n",
        )
        .unwrap();
        let (name, values) = &spec.enums.0[0];
        assert_eq!(name, "kind");
        // YAML resolves 0x10 to the integer 16.
        assert_eq!(values.0[0], ("16".into(), "high".into()));
        assert_eq!(values.0[1], ("1".into(), "low".into()));
    }

    #[test]
    fn test_types_map_order() {
        let spec: TypeSpec = serde_yaml::from_str(
            "types:\n  zeta:\n    seq: []\n  alpha:\n    seq: []\n",
        )
        .unwrap();
        assert_eq!(spec.types.0[0].0, "zeta");
        assert_eq!(spec.types.0[1].0, "alpha");
    }

    #[test]
    fn test_multi_string() {
        let spec: TypeSpec = serde_yaml::from_str("doc-ref: one\n").unwrap();
        assert_eq!(spec.doc_ref.0, vec!["one"]);
        let spec: TypeSpec = serde_yaml::from_str("doc-ref: [one, two]\n").unwrap();
        assert_eq!(spec.doc_ref.0, vec!["one", "two"]);
    }
}
