//! JSON rendering of query results.
//!
//! File and dataset records are rendered as JSON objects through
//! `serde_json`; output is deterministic (object keys sorted by the
//! serializer's map ordering) and the integer/float distinction of
//! [`Value`](crate::Value) is preserved.

use serde_json::{Map, Value as Json, json};

use crate::executor::{DatasetRecord, FileRecord};
use crate::value::Value;

pub fn file_to_json(record: &FileRecord) -> Json {
    let mut obj = Map::new();
    obj.insert("fid".to_string(), json!(record.fid));
    obj.insert("namespace".to_string(), json!(record.namespace));
    obj.insert("name".to_string(), json!(record.name));
    obj.insert(
        "metadata".to_string(),
        match &record.metadata {
            Some(meta) => Value::Object(meta.clone()).to_json(),
            None => Json::Null,
        },
    );
    if let Some(size) = record.size {
        obj.insert("size".to_string(), json!(size));
    }
    if let Some(creator) = &record.creator {
        obj.insert("creator".to_string(), json!(creator));
    }
    if let Some(t) = record.created_timestamp {
        obj.insert("created_timestamp".to_string(), json!(t));
    }
    if let Some(parents) = &record.parents {
        obj.insert("parents".to_string(), json!(parents));
    }
    if let Some(children) = &record.children {
        obj.insert("children".to_string(), json!(children));
    }
    Json::Object(obj)
}

pub fn dataset_to_json(record: &DatasetRecord) -> Json {
    let mut obj = Map::new();
    obj.insert("namespace".to_string(), json!(record.namespace));
    obj.insert("name".to_string(), json!(record.name));
    obj.insert(
        "metadata".to_string(),
        Value::Object(record.metadata.clone()).to_json(),
    );
    obj.insert("frozen".to_string(), json!(record.frozen));
    obj.insert("monotonic".to_string(), json!(record.monotonic));
    obj.insert("file_count".to_string(), json!(record.file_count));
    Json::Object(obj)
}

pub fn to_json(value: &Json) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn to_json_pretty(value: &Json) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}
