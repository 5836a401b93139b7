// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

const DEFAULT_TEXT_ROWS: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Datetime,
    Json,
    Select,
    Static,
    Text,
    Group,
}

impl FieldType {
    pub const ALL: [Self; 9] = [
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::Datetime,
        Self::Json,
        Self::Select,
        Self::Static,
        Self::Text,
        Self::Group,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Json => "json",
            Self::Select => "select",
            Self::Static => "static",
            Self::Text => "text",
            Self::Group => "group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "datetime" => Some(Self::Datetime),
            "json" => Some(Self::Json),
            "select" => Some(Self::Select),
            "static" => Some(Self::Static),
            "text" => Some(Self::Text),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    /// Leaf types hold a value in a record's data map.
    pub const fn holds_value(self) -> bool {
        !matches!(self, Self::Static | Self::Group)
    }
}

/// One `(value, label)` entry of a select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawChoice")]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChoice {
    Pair(String, String),
    Plain(String),
    Full { value: String, label: String },
}

impl From<RawChoice> for Choice {
    fn from(raw: RawChoice) -> Self {
        match raw {
            RawChoice::Pair(value, label) | RawChoice::Full { value, label } => {
                Self { value, label }
            }
            RawChoice::Plain(value) => Self {
                label: value.clone(),
                value,
            },
        }
    }
}

/// Type-specific part of a field. Only `Select` carries choices and only
/// `Group` carries nested fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Datetime,
    Json,
    Select {
        #[serde(default)]
        choices: Vec<Choice>,
        #[serde(default)]
        nullable: bool,
    },
    Static {
        #[serde(default)]
        html: String,
    },
    Text {
        #[serde(default = "default_text_rows")]
        rows: u16,
    },
    Group {
        #[serde(default)]
        fields: FieldSet,
    },
}

impl FieldKind {
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::String => FieldType::String,
            Self::Number => FieldType::Number,
            Self::Boolean => FieldType::Boolean,
            Self::Datetime => FieldType::Datetime,
            Self::Json => FieldType::Json,
            Self::Select { .. } => FieldType::Select,
            Self::Static { .. } => FieldType::Static,
            Self::Text { .. } => FieldType::Text,
            Self::Group { .. } => FieldType::Group,
        }
    }

    pub fn text() -> Self {
        Self::Text {
            rows: DEFAULT_TEXT_ROWS,
        }
    }

    pub fn select(choices: Vec<Choice>, nullable: bool) -> Self {
        Self::Select { choices, nullable }
    }

    pub fn group(fields: Vec<FieldSchema>) -> Self {
        Self::Group {
            fields: FieldSet::new(fields),
        }
    }
}

fn default_text_rows() -> u16 {
    DEFAULT_TEXT_ROWS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: label.into(),
            required: false,
            editable: true,
            visible: true,
            description: None,
            placeholder: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub const fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    pub fn choices(&self) -> &[Choice] {
        match &self.kind {
            FieldKind::Select { choices, .. } => choices,
            _ => &[],
        }
    }

    pub fn nullable(&self) -> bool {
        matches!(self.kind, FieldKind::Select { nullable: true, .. })
    }

    pub fn fields(&self) -> &[FieldSchema] {
        match &self.kind {
            FieldKind::Group { fields } => fields.as_slice(),
            _ => &[],
        }
    }

    /// Label used in messages; falls back to the field name.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Ordered set of sibling fields. Declaration order is preserved whether the
/// wire form is an object keyed by name or an array of named schemas.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSet(Vec<FieldSchema>);

impl FieldSet {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self(fields)
    }

    pub fn as_slice(&self) -> &[FieldSchema] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldSchema> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finds a field by name anywhere in the tree, groups included.
    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        find_in(&self.0, name)
    }

    /// Finds a value-holding field by name, skipping static and group entries.
    pub fn leaf(&self, name: &str) -> Option<&FieldSchema> {
        self.get(name)
            .filter(|field| field.field_type().holds_value())
    }

    /// Visits every field depth-first in declaration order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a FieldSchema)) {
        walk_in(&self.0, visit);
    }

    /// Value-holding fields, flattened out of groups.
    pub fn leaves(&self) -> Vec<&FieldSchema> {
        let mut out = Vec::new();
        self.walk(&mut |field| {
            if field.field_type().holds_value() {
                out.push(field);
            }
        });
        out
    }

    pub fn validate(&self) -> Result<()> {
        validate_siblings(&self.0, None, &mut BTreeSet::new())
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldSchema;
    type IntoIter = std::slice::Iter<'a, FieldSchema>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<FieldSchema>> for FieldSet {
    fn from(fields: Vec<FieldSchema>) -> Self {
        Self(fields)
    }
}

impl<'a> From<&'a FieldSet> for Cow<'a, FieldSet> {
    fn from(fields: &'a FieldSet) -> Self {
        Cow::Borrowed(fields)
    }
}

impl From<FieldSet> for Cow<'_, FieldSet> {
    fn from(fields: FieldSet) -> Self {
        Cow::Owned(fields)
    }
}

fn find_in<'a>(fields: &'a [FieldSchema], name: &str) -> Option<&'a FieldSchema> {
    for field in fields {
        if field.name == name {
            return Some(field);
        }
        if let Some(found) = find_in(field.fields(), name) {
            return Some(found);
        }
    }
    None
}

fn walk_in<'a>(fields: &'a [FieldSchema], visit: &mut impl FnMut(&'a FieldSchema)) {
    for field in fields {
        visit(field);
        walk_in(field.fields(), visit);
    }
}

fn validate_siblings<'a>(
    fields: &'a [FieldSchema],
    parent: Option<&str>,
    values: &mut BTreeSet<&'a str>,
) -> Result<()> {
    let mut seen = BTreeSet::new();
    for field in fields {
        if field.name.trim().is_empty() {
            bail!(
                "field with label {:?} has no name -- every field needs a unique name",
                field.label
            );
        }
        if !seen.insert(field.name.as_str()) {
            match parent {
                Some(parent) => bail!(
                    "duplicate field name {:?} in group {:?}",
                    field.name,
                    parent
                ),
                None => bail!("duplicate field name {:?}", field.name),
            }
        }
        // Values live in one flat map keyed by name.
        if field.field_type().holds_value() && !values.insert(field.name.as_str()) {
            bail!(
                "field name {:?} is used by more than one value field -- names must be unique across groups",
                field.name
            );
        }
        validate_siblings(field.fields(), Some(&field.name), values)?;
    }
    Ok(())
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldSetVisitor)
    }
}

struct FieldSetVisitor;

impl<'de> Visitor<'de> for FieldSetVisitor {
    type Value = FieldSet;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object of fields keyed by name or an array of named fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldSet, A::Error> {
        let mut fields = Vec::new();
        while let Some((name, mut field)) = map.next_entry::<String, FieldSchema>()? {
            field.name = name;
            fields.push(field);
        }
        checked(fields)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FieldSet, A::Error> {
        let mut fields = Vec::new();
        while let Some(field) = seq.next_element::<FieldSchema>()? {
            fields.push(field);
        }
        checked(fields)
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldSet, E> {
        Ok(FieldSet::default())
    }
}

fn checked<E: de::Error>(fields: Vec<FieldSchema>) -> Result<FieldSet, E> {
    let set = FieldSet(fields);
    set.validate().map_err(|error| E::custom(format!("{error:#}")))?;
    Ok(set)
}
