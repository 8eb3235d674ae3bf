//! Conversion of items and operation descriptions to plain JSON mappings.
//!
//! Every mapping carries a `"_kind"` entry naming the type it was produced
//! from, so a reader can dispatch on it before decoding.

use crate::error::{ConfigError, FlowError, Result};
use crate::id::ItemId;
use crate::item::{Content, DataItem, Metadata};
use crate::operation::{OpConfig, OperationDescription};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the kind tag.
pub const KIND_KEY: &str = "_kind";

/// Types that round-trip through a tagged JSON mapping.
pub trait DictConvertible: Sized {
    const KIND: &'static str;

    fn to_dict(&self) -> Result<Value>;

    fn from_dict(dict: &Value) -> Result<Self>;
}

/// Insert the kind tag. Fails if the mapping already has one.
pub fn add_kind(dict: &mut Map<String, Value>, kind: &str) -> Result<()> {
    if dict.contains_key(KIND_KEY) {
        return Err(parse_error(format!(
            "mapping already has a '{KIND_KEY}' entry"
        )));
    }
    dict.insert(KIND_KEY.to_string(), Value::String(kind.to_string()));
    Ok(())
}

/// Read the kind tag of a mapping.
pub fn kind_of(dict: &Value) -> Result<&str> {
    dict.get(KIND_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| parse_error(format!("mapping has no '{KIND_KEY}' entry")))
}

fn expect_kind(dict: &Value, kind: &str) -> Result<()> {
    let found = kind_of(dict)?;
    if found != kind {
        return Err(parse_error(format!("expected kind '{kind}', found '{found}'")));
    }
    Ok(())
}

fn parse_error(message: String) -> FlowError {
    ConfigError::ParseError { message }.into()
}

fn tagged<T: Serialize>(record: &T, kind: &str) -> Result<Value> {
    match serde_json::to_value(record)? {
        Value::Object(mut map) => {
            add_kind(&mut map, kind)?;
            Ok(Value::Object(map))
        }
        other => Err(parse_error(format!("{kind} did not encode to a mapping: {other}"))),
    }
}

#[derive(Serialize, Deserialize)]
struct ItemRecord {
    id: ItemId,
    label: String,
    content: Content,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    attrs: Vec<Value>,
}

impl DictConvertible for DataItem {
    const KIND: &'static str = "DataItem";

    /// Attached attributes are encoded recursively.
    fn to_dict(&self) -> Result<Value> {
        let attrs = self
            .attrs()
            .iter()
            .map(|a| a.to_dict())
            .collect::<Result<Vec<_>>>()?;
        let record = ItemRecord {
            id: self.id().clone(),
            label: self.label().to_string(),
            content: self.content().clone(),
            metadata: self.metadata().clone(),
            attrs,
        };
        tagged(&record, Self::KIND)
    }

    fn from_dict(dict: &Value) -> Result<Self> {
        expect_kind(dict, Self::KIND)?;
        let record: ItemRecord = serde_json::from_value(dict.clone())?;
        let item = DataItem::with_id(record.id, record.label, record.content)
            .with_metadata(record.metadata);
        for attr in &record.attrs {
            item.add_attr(DataItem::from_dict(attr)?.into_ref());
        }
        Ok(item)
    }
}

#[derive(Serialize, Deserialize)]
struct OperationRecord {
    id: ItemId,
    name: String,
    #[serde(default)]
    config: OpConfig,
}

impl DictConvertible for OperationDescription {
    const KIND: &'static str = "OperationDescription";

    fn to_dict(&self) -> Result<Value> {
        let record = OperationRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            config: self.config.clone(),
        };
        tagged(&record, Self::KIND)
    }

    fn from_dict(dict: &Value) -> Result<Self> {
        expect_kind(dict, Self::KIND)?;
        let record: OperationRecord = serde_json::from_value(dict.clone())?;
        Ok(OperationDescription::new(record.id, record.name).with_config(record.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdGenerator;
    use crate::item::Span;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_item_dict_carries_kind_and_attrs() {
        let ids = IdGenerator::seeded(1);
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("ocr"));
        let item = DataItem::new(&ids, "sentence", Content::text("No fever.", vec![Span::new(0, 9)]))
            .with_metadata(metadata)
            .into_ref();
        item.add_attr(DataItem::new(&ids, "negation", Content::value(true)).into_ref());

        let dict = item.to_dict().unwrap();
        assert_eq!(kind_of(&dict).unwrap(), "DataItem");
        assert_eq!(dict["content"]["type"], "text");
        assert_eq!(dict["attrs"][0]["_kind"], "DataItem");

        let decoded = DataItem::from_dict(&dict).unwrap();
        assert_eq!(decoded.id(), item.id());
        assert_eq!(decoded.content(), item.content());
        assert_eq!(decoded.metadata(), item.metadata());
        assert_eq!(decoded.attrs_by_label("negation")[0].content(), &Content::value(true));
    }

    #[test]
    fn test_operation_dict() {
        let desc = OperationDescription::new(ItemId::from("op-1"), "RegexMatcher")
            .with_entry("rules", json!([{ "label": "drug", "pattern": "aspirin" }]));
        let dict = desc.to_dict().unwrap();
        assert_eq!(
            dict,
            json!({
                "_kind": "OperationDescription",
                "id": "op-1",
                "name": "RegexMatcher",
                "config": { "rules": [{ "label": "drug", "pattern": "aspirin" }] },
            })
        );
        assert_eq!(OperationDescription::from_dict(&dict).unwrap(), desc);
    }

    #[test]
    fn test_missing_or_wrong_kind_rejected() {
        let no_kind = json!({ "id": "op-1", "name": "X" });
        assert!(OperationDescription::from_dict(&no_kind).is_err());

        let desc = OperationDescription::new(ItemId::from("op-1"), "X");
        let dict = desc.to_dict().unwrap();
        assert!(DataItem::from_dict(&dict).is_err());
    }

    #[test]
    fn test_add_kind_refuses_existing_tag() {
        let mut map = Map::new();
        add_kind(&mut map, "A").unwrap();
        assert!(add_kind(&mut map, "B").is_err());
        assert_eq!(map[KIND_KEY], "A");
    }
}
