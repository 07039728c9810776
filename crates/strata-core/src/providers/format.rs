//! File format codecs for [`super::FileProvider`]
//!
//! Every codec maps between a flat list of dot-separated keys and the
//! format's natural document shape:
//!
//! - JSON/YAML/TOML: nested trees; `database.host` becomes a `database`
//!   table holding `host`. Scalars keep their native kinds.
//! - INI: the first key segment is the section, the rest the entry key.
//!   All values are text; the coercion layer recovers primitives on read.
//! - XML: a flat `<settings><entry key=".." kind="..">..</entry></settings>`
//!   document with a `kind` attribute preserving the value kind.
//!
//! Complex (`Serialized` object) values are persisted as JSON text strings
//! in every format so that a hierarchy key like `a.b` can never collide
//! with a stored object under `a`; arrays and null are written natively
//! where the format can express them.

use crate::error::{StrataError, StrataResult};
use crate::value::SettingsValue;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

/// The on-disk encoding of a file-backed provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// JSON document with nested objects
    Json,
    /// TOML document with nested tables
    Toml,
    /// YAML document with nested mappings
    Yaml,
    /// INI document, one section per top-level key segment
    Ini,
    /// Flat XML entry list
    Xml,
}

impl FileFormat {
    /// Codec name used in diagnostics and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Ini => "ini",
            Self::Xml => "xml",
        }
    }

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Ini => "ini",
            Self::Xml => "xml",
        }
    }

    /// Guess the format from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("ini") | Some("conf") => Some(Self::Ini),
            Some("xml") => Some(Self::Xml),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decode `text` into (original-case key, value) pairs
pub(crate) fn parse(format: FileFormat, text: &str) -> StrataResult<Vec<(String, SettingsValue)>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match format {
        FileFormat::Json => parse_json(text),
        FileFormat::Toml => parse_toml(text),
        FileFormat::Yaml => parse_yaml(text),
        FileFormat::Ini => parse_ini(text),
        FileFormat::Xml => parse_xml(text),
    }
}

/// Encode the entries into the format's document text
pub(crate) fn serialize(
    format: FileFormat,
    entries: &BTreeMap<String, SettingsValue>,
) -> StrataResult<String> {
    match format {
        FileFormat::Json => serialize_json(entries),
        FileFormat::Toml => serialize_toml(entries),
        FileFormat::Yaml => serialize_yaml(entries),
        FileFormat::Ini => Ok(serialize_ini(entries)),
        FileFormat::Xml => serialize_xml(entries),
    }
}

// ---------------------------------------------------------------- JSON/YAML

fn parse_json(text: &str) -> StrataResult<Vec<(String, SettingsValue)>> {
    let root: JsonValue = serde_json::from_str(text)?;
    flatten_root(FileFormat::Json, root)
}

fn parse_yaml(text: &str) -> StrataResult<Vec<(String, SettingsValue)>> {
    let root: JsonValue = serde_yaml::from_str(text)?;
    flatten_root(FileFormat::Yaml, root)
}

fn flatten_root(format: FileFormat, root: JsonValue) -> StrataResult<Vec<(String, SettingsValue)>> {
    match root {
        JsonValue::Object(map) => {
            let mut out = Vec::new();
            for (key, value) in map {
                flatten_into(&key, value, &mut out);
            }
            Ok(out)
        }
        JsonValue::Null => Ok(Vec::new()),
        _ => Err(StrataError::format(
            format.name(),
            "top-level document must be an object",
        )),
    }
}

fn flatten_into(prefix: &str, value: JsonValue, out: &mut Vec<(String, SettingsValue)>) {
    match value {
        JsonValue::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{}.{}", prefix, key), child, out);
            }
        }
        leaf => out.push((prefix.to_string(), SettingsValue::from_json(leaf))),
    }
}

fn serialize_json(entries: &BTreeMap<String, SettingsValue>) -> StrataResult<String> {
    let root = unflatten(entries)?;
    let mut text = serde_json::to_string_pretty(&JsonValue::Object(root))?;
    text.push('\n');
    Ok(text)
}

fn serialize_yaml(entries: &BTreeMap<String, SettingsValue>) -> StrataResult<String> {
    let root = unflatten(entries)?;
    Ok(serde_yaml::to_string(&JsonValue::Object(root))?)
}

fn unflatten(entries: &BTreeMap<String, SettingsValue>) -> StrataResult<serde_json::Map<String, JsonValue>> {
    let mut root = serde_json::Map::new();
    for (key, value) in entries {
        let segments: Vec<&str> = key.split('.').collect();
        let leaf = leaf_to_json(value)?;
        insert_nested(&mut root, &segments, leaf);
    }
    Ok(root)
}

fn insert_nested(map: &mut serde_json::Map<String, JsonValue>, segments: &[&str], value: JsonValue) {
    if segments.len() == 1 {
        map.insert(segments[0].to_string(), value);
        return;
    }
    let child = map
        .entry(segments[0].to_string())
        .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
    if !child.is_object() {
        // A scalar stored under "a" conflicts with a key "a.b"; the
        // hierarchy wins and the scalar is dropped.
        tracing::warn!("key '{}' shadowed by nested keys, dropping its value", segments[0]);
        *child = JsonValue::Object(serde_json::Map::new());
    }
    if let JsonValue::Object(inner) = child {
        insert_nested(inner, &segments[1..], value);
    }
}

fn leaf_to_json(value: &SettingsValue) -> StrataResult<JsonValue> {
    match value {
        SettingsValue::Serialized(JsonValue::Object(map)) => Ok(JsonValue::String(
            serde_json::to_string(&JsonValue::Object(map.clone()))?,
        )),
        other => Ok(other.to_json()),
    }
}

// --------------------------------------------------------------------- TOML

fn parse_toml(text: &str) -> StrataResult<Vec<(String, SettingsValue)>> {
    let root: toml::Value = toml::from_str(text)?;
    let table = match root {
        toml::Value::Table(table) => table,
        _ => {
            return Err(StrataError::format(
                "toml",
                "top-level document must be a table",
            ))
        }
    };
    let mut out = Vec::new();
    for (key, value) in table {
        flatten_toml_into(&key, value, &mut out)?;
    }
    Ok(out)
}

fn flatten_toml_into(
    prefix: &str,
    value: toml::Value,
    out: &mut Vec<(String, SettingsValue)>,
) -> StrataResult<()> {
    match value {
        toml::Value::Table(table) if !table.is_empty() => {
            for (key, child) in table {
                flatten_toml_into(&format!("{}.{}", prefix, key), child, out)?;
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), SettingsValue::Text(s))),
        toml::Value::Integer(i) => out.push((prefix.to_string(), SettingsValue::Int(i))),
        toml::Value::Float(f) => out.push((prefix.to_string(), SettingsValue::Float(f))),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), SettingsValue::Bool(b))),
        toml::Value::Datetime(dt) => {
            out.push((prefix.to_string(), SettingsValue::Text(dt.to_string())))
        }
        other => {
            // Arrays and empty tables have no native kind; keep the JSON shape.
            let json = serde_json::to_value(&other)?;
            out.push((prefix.to_string(), SettingsValue::Serialized(json)));
        }
    }
    Ok(())
}

fn serialize_toml(entries: &BTreeMap<String, SettingsValue>) -> StrataResult<String> {
    let mut root = toml::map::Map::new();
    for (key, value) in entries {
        let segments: Vec<&str> = key.split('.').collect();
        let leaf = match value {
            SettingsValue::Text(s) => toml::Value::String(s.clone()),
            SettingsValue::Int(i) => toml::Value::Integer(*i),
            SettingsValue::Float(f) => toml::Value::Float(*f),
            SettingsValue::Bool(b) => toml::Value::Boolean(*b),
            SettingsValue::Serialized(v) => toml::Value::String(serde_json::to_string(v)?),
        };
        insert_nested_toml(&mut root, &segments, leaf);
    }
    Ok(toml::to_string_pretty(&toml::Value::Table(root))?)
}

fn insert_nested_toml(map: &mut toml::map::Map<String, toml::Value>, segments: &[&str], value: toml::Value) {
    if segments.len() == 1 {
        map.insert(segments[0].to_string(), value);
        return;
    }
    let child = map
        .entry(segments[0].to_string())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if !child.is_table() {
        tracing::warn!("key '{}' shadowed by nested keys, dropping its value", segments[0]);
        *child = toml::Value::Table(toml::map::Map::new());
    }
    if let toml::Value::Table(inner) = child {
        insert_nested_toml(inner, &segments[1..], value);
    }
}

// ---------------------------------------------------------------------- INI

fn parse_ini(text: &str) -> StrataResult<Vec<(String, SettingsValue)>> {
    let mut out = Vec::new();
    let mut section = String::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix('[') {
            let name = rest.strip_suffix(']').ok_or_else(|| {
                StrataError::format("ini", format!("unterminated section header on line {}", index + 1))
            })?;
            section = name.trim().to_string();
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            StrataError::format("ini", format!("expected 'key=value' on line {}", index + 1))
        })?;
        let key = if section.is_empty() {
            key.trim().to_string()
        } else {
            format!("{}.{}", section, key.trim())
        };
        out.push((key, SettingsValue::Text(value.trim().to_string())));
    }
    Ok(out)
}

fn serialize_ini(entries: &BTreeMap<String, SettingsValue>) -> String {
    let mut text = String::new();
    let mut sections: BTreeMap<&str, Vec<(&str, String)>> = BTreeMap::new();
    for (key, value) in entries {
        let rendered = plain_text(value);
        match key.split_once('.') {
            Some((section, rest)) => sections.entry(section).or_default().push((rest, rendered)),
            None => sections.entry("").or_default().push((key, rendered)),
        }
    }
    for (section, pairs) in sections {
        if !section.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("[{}]\n", section));
        }
        for (key, value) in pairs {
            text.push_str(&format!("{}={}\n", key, value));
        }
    }
    text
}

// ---------------------------------------------------------------------- XML

fn xml_err(error: impl std::fmt::Display) -> StrataError {
    StrataError::format("xml", error.to_string())
}

fn parse_xml(text: &str) -> StrataResult<Vec<(String, SettingsValue)>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(element) if element.name().as_ref() == b"entry" => {
                let (key, kind) = entry_attributes(&element)?;
                let end = element.to_end().into_owned();
                let raw = reader.read_text(end.name()).map_err(xml_err)?;
                let content = quick_xml::escape::unescape(&raw)
                    .map_err(xml_err)?
                    .into_owned();
                out.push((key, revive_value(&kind, content)));
            }
            Event::Empty(element) if element.name().as_ref() == b"entry" => {
                let (key, kind) = entry_attributes(&element)?;
                out.push((key, revive_value(&kind, String::new())));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn entry_attributes(element: &BytesStart<'_>) -> StrataResult<(String, String)> {
    let mut key = None;
    let mut kind = String::from("string");
    for attribute in element.attributes() {
        let attribute = attribute.map_err(xml_err)?;
        let value = attribute.unescape_value().map_err(xml_err)?.into_owned();
        match attribute.key.as_ref() {
            b"key" => key = Some(value),
            b"kind" => kind = value,
            _ => {}
        }
    }
    let key = key.ok_or_else(|| xml_err("entry element is missing the 'key' attribute"))?;
    Ok((key, kind))
}

/// Rebuild a value from its `kind` attribute; anything that does not parse
/// degrades to text rather than failing the whole document
fn revive_value(kind: &str, content: String) -> SettingsValue {
    match kind {
        "int" => content
            .parse()
            .map(SettingsValue::Int)
            .unwrap_or(SettingsValue::Text(content)),
        "float" => content
            .parse()
            .map(SettingsValue::Float)
            .unwrap_or(SettingsValue::Text(content)),
        "bool" => content
            .parse()
            .map(SettingsValue::Bool)
            .unwrap_or(SettingsValue::Text(content)),
        "json" => serde_json::from_str(&content)
            .map(SettingsValue::Serialized)
            .unwrap_or(SettingsValue::Text(content)),
        _ => SettingsValue::Text(content),
    }
}

fn serialize_xml(entries: &BTreeMap<String, SettingsValue>) -> StrataResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("settings")))
        .map_err(xml_err)?;
    for (key, value) in entries {
        let mut element = BytesStart::new("entry");
        element.push_attribute(("key", key.as_str()));
        element.push_attribute(("kind", value.kind()));
        let content = match value {
            SettingsValue::Serialized(v) => serde_json::to_string(v)?,
            other => plain_text(other),
        };
        writer.write_event(Event::Start(element)).map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(&content)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("entry")))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("settings")))
        .map_err(xml_err)?;
    let mut text = String::from_utf8(writer.into_inner())
        .map_err(|e| StrataError::format("xml", e.to_string()))?;
    text.push('\n');
    Ok(text)
}

/// Plain string rendering used by the string-only codecs
fn plain_text(value: &SettingsValue) -> String {
    match value {
        SettingsValue::Text(s) => s.clone(),
        SettingsValue::Int(i) => i.to_string(),
        SettingsValue::Float(f) => f.to_string(),
        SettingsValue::Bool(b) => b.to_string(),
        SettingsValue::Serialized(v) => v.to_string(),
    }
}
