// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

use crate::codec::{parse_number, parse_timestamp, plain_text};
use crate::render::{Control, Mode, RenderContext, render_field};
use crate::{Codec, DataMap, DateRange, EditValue, FieldSchema, FieldSet, FieldType, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Range(DateRange),
}

impl FilterValue {
    fn empty_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Datetime => Self::Range(DateRange::default()),
            _ => Self::Text(String::new()),
        }
    }

    fn fits(&self, field_type: FieldType) -> bool {
        match self {
            Self::Range(_) => field_type == FieldType::Datetime,
            Self::Text(_) => field_type != FieldType::Datetime,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Range(range) => serde_json::json!({"from": range.from, "to": range.to}),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Range(range) => range.is_unbounded(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFilter {
    pub field_type: FieldType,
    pub label: String,
    pub value: FilterValue,
}

/// Active filters over one schema, in the order they were added.
#[derive(Debug, Clone)]
pub struct FilterEngine<'a> {
    fields: Cow<'a, FieldSet>,
    codec: Codec,
    active: Vec<(String, ActiveFilter)>,
}

impl<'a> FilterEngine<'a> {
    pub fn new(fields: impl Into<Cow<'a, FieldSet>>, codec: Codec) -> Self {
        Self {
            fields: fields.into(),
            codec,
            active: Vec::new(),
        }
    }

    pub fn active(&self) -> &[(String, ActiveFilter)] {
        &self.active
    }

    pub fn get(&self, name: &str) -> Option<&ActiveFilter> {
        self.position(name).map(|index| &self.active[index].1)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Visible value fields not yet filtered on.
    pub fn available_fields(&self) -> Vec<&FieldSchema> {
        self.fields
            .leaves()
            .into_iter()
            .filter(|field| field.visible && !self.is_active(&field.name))
            .collect()
    }

    /// No-op when the name is already active, hidden, or not a value field.
    pub fn add_filter(&mut self, name: &str) -> bool {
        if self.is_active(name) {
            debug!(field = name, "filter already active");
            return false;
        }
        let Some(field) = self.fields.leaf(name) else {
            debug!(field = name, "filter refused; no such value field");
            return false;
        };
        if !field.visible {
            debug!(field = name, "filter refused; field is hidden");
            return false;
        }
        let field_type = field.field_type();
        self.active.push((
            field.name.clone(),
            ActiveFilter {
                field_type,
                label: field.display_label().to_owned(),
                value: FilterValue::empty_for(field_type),
            },
        ));
        debug!(field = name, "filter added");
        true
    }

    pub fn remove_filter(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.active.remove(index);
                debug!(field = name, "filter removed");
                true
            }
            None => false,
        }
    }

    /// Replaces the value of an active filter. The value's shape must match
    /// the filter's type: a range for datetimes, text for everything else.
    pub fn set_filter_value(&mut self, name: &str, value: FilterValue) -> bool {
        let Some(index) = self.position(name) else {
            debug!(field = name, "filter value ignored; filter not active");
            return false;
        };
        let filter = &mut self.active[index].1;
        if !value.fits(filter.field_type) {
            debug!(field = name, ?value, "filter value ignored; shape does not fit type");
            return false;
        }
        filter.value = value;
        true
    }

    /// Applies an edit value produced by a filter control.
    pub fn set_filter_input(&mut self, name: &str, edit: EditValue) -> bool {
        let value = match edit {
            EditValue::Text(text) => FilterValue::Text(text),
            EditValue::Flag(flag) => FilterValue::Text(flag.to_string()),
            EditValue::Range { from, to } => {
                FilterValue::Range(self.codec.range_from_editable(&from, &to))
            }
            EditValue::Inert => return false,
        };
        self.set_filter_value(name, value)
    }

    pub fn reset(&mut self) {
        self.active.clear();
    }

    /// Points the engine at another schema. Active filters are kept; any
    /// that no longer fit are skipped during evaluation.
    pub fn rebind(&mut self, fields: impl Into<Cow<'a, FieldSet>>) {
        self.fields = fields.into();
    }

    /// True when every active filter holds. No filters means everything
    /// matches.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        self.active
            .iter()
            .all(|(name, filter)| self.holds(name, filter, record.field(name)))
    }

    pub fn filter<'r, R: Record>(&self, records: &'r [R]) -> Vec<&'r R> {
        records.iter().filter(|record| self.matches(*record)).collect()
    }

    /// Filter-mode controls for the active filters, in chip order.
    pub fn controls(&self) -> Vec<Control> {
        let values: DataMap = self
            .active
            .iter()
            .map(|(name, filter)| (name.clone(), filter.value.to_value()))
            .collect();
        let errors = BTreeMap::new();
        let ctx = RenderContext::new(self.codec, &values, &errors);
        self.active
            .iter()
            .filter_map(|(name, _)| self.fields.leaf(name))
            .filter_map(|field| render_field(field, Mode::Filter, ctx))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.active.iter().position(|(active, _)| active == name)
    }

    fn holds(&self, name: &str, filter: &ActiveFilter, value: Option<&Value>) -> bool {
        let Some(field) = self.fields.leaf(name) else {
            debug!(field = name, "filter skipped; field not in schema");
            return true;
        };
        if field.field_type() != filter.field_type {
            debug!(
                field = name,
                expected = filter.field_type.as_str(),
                actual = field.field_type().as_str(),
                "filter skipped; field type changed"
            );
            return true;
        }

        match (&filter.value, filter.field_type) {
            (FilterValue::Range(range), FieldType::Datetime) => within(range, value),
            (FilterValue::Text(query), FieldType::Number) => number_equals(query, value),
            (FilterValue::Text(query), FieldType::Boolean | FieldType::Select) => {
                let query = query.trim();
                query.is_empty() || (!is_missing(value) && plain_text(value) == query)
            }
            (FilterValue::Text(query), _) => contains(query, value),
            (FilterValue::Range(_), _) => true,
        }
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn contains(query: &str, value: Option<&Value>) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    if is_missing(value) {
        return false;
    }
    plain_text(value)
        .to_lowercase()
        .contains(&query.to_lowercase())
}

fn number_equals(query: &str, value: Option<&Value>) -> bool {
    let Some(wanted) = parse_number(query).and_then(|number| number.as_f64()) else {
        return true;
    };
    let actual = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => parse_number(text).and_then(|number| number.as_f64()),
        _ => None,
    };
    actual == Some(wanted)
}

/// Missing or unparseable record timestamps are never excluded; an
/// unparseable bound counts as unset.
fn within(range: &DateRange, value: Option<&Value>) -> bool {
    let Some(stamp) = value
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
    else {
        return true;
    };
    if parse_timestamp(&range.from).is_some_and(|from| stamp < from) {
        return false;
    }
    if parse_timestamp(&range.to).is_some_and(|to| stamp > to) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{FilterEngine, FilterValue};
    use crate::render::{Input, Widget};
    use crate::{
        Choice, Codec, DataMap, DateRange, EditValue, FieldKind, FieldSchema, FieldSet,
        Submission,
    };
    use serde_json::json;

    fn record(code: &str, data: serde_json::Value) -> Submission {
        Submission {
            code: code.to_owned(),
            data: match data {
                serde_json::Value::Object(map) => map,
                _ => DataMap::new(),
            },
        }
    }

    fn schema() -> FieldSet {
        FieldSet::new(vec![
            FieldSchema::new("problemDescription", "Problem Description", FieldKind::String)
                .required(),
            FieldSchema::new("contractNumber", "Contract Number", FieldKind::Number),
            FieldSchema::new("callBack", "Callback Required", FieldKind::Boolean),
            FieldSchema::new("installDate", "Install Date", FieldKind::Datetime),
            FieldSchema::new(
                "priority",
                "Priority",
                FieldKind::select(
                    vec![Choice::new("low", "Low"), Choice::new("lowest", "Lowest")],
                    false,
                ),
            ),
            FieldSchema::new("intro", "", FieldKind::Static { html: String::new() }),
        ])
    }

    #[test]
    fn substring_filter_is_case_insensitive() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        assert!(filters.add_filter("problemDescription"));
        assert!(filters.set_filter_value(
            "problemDescription",
            FilterValue::Text("login".to_owned())
        ));

        assert!(filters.matches(&record(
            "a",
            json!({"problemDescription": "System login issues"})
        )));
        assert!(!filters.matches(&record("b", json!({"problemDescription": "Billing question"}))));
        assert!(filters.matches(&record("c", json!({"problemDescription": "LOGIN page"}))));
        assert!(!filters.matches(&record("d", json!({}))));
    }

    #[test]
    fn empty_filter_values_match_everything() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        for name in [
            "problemDescription",
            "contractNumber",
            "callBack",
            "installDate",
            "priority",
        ] {
            assert!(filters.add_filter(name));
        }
        assert!(filters.matches(&record("a", json!({}))));
        assert!(filters.matches(&record("b", json!({"contractNumber": 3, "callBack": true}))));
    }

    #[test]
    fn datetime_range_from_only() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("installDate");
        filters.set_filter_value(
            "installDate",
            FilterValue::Range(DateRange::new("2024-01-01T00:00:00Z", "")),
        );

        assert!(filters.matches(&record("a", json!({"installDate": "2024-02-01T10:00:00Z"}))));
        assert!(!filters.matches(&record("b", json!({"installDate": "2023-12-01T00:00:00Z"}))));
        assert!(filters.matches(&record("c", json!({}))));
        assert!(filters.matches(&record("d", json!({"installDate": ""}))));
    }

    #[test]
    fn datetime_range_bounds_are_inclusive() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("installDate");
        filters.set_filter_value(
            "installDate",
            FilterValue::Range(DateRange::new("2024-01-01T00:00:00Z", "2024-01-31T00:00:00Z")),
        );
        assert!(filters.matches(&record("a", json!({"installDate": "2024-01-01T00:00:00Z"}))));
        assert!(filters.matches(&record("b", json!({"installDate": "2024-01-31T00:00:00Z"}))));
        assert!(!filters.matches(&record("c", json!({"installDate": "2024-02-01T00:00:00Z"}))));
    }

    #[test]
    fn number_and_boolean_use_exact_equality() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("contractNumber");
        filters.set_filter_value("contractNumber", FilterValue::Text("12345".to_owned()));
        assert!(filters.matches(&record("a", json!({"contractNumber": 12345}))));
        assert!(filters.matches(&record("b", json!({"contractNumber": "12345"}))));
        assert!(!filters.matches(&record("c", json!({"contractNumber": 123456}))));

        filters.reset();
        filters.add_filter("callBack");
        filters.set_filter_value("callBack", FilterValue::Text("false".to_owned()));
        assert!(filters.matches(&record("a", json!({"callBack": false}))));
        assert!(!filters.matches(&record("b", json!({"callBack": true}))));
        assert!(!filters.matches(&record("c", json!({}))));
    }

    #[test]
    fn select_filter_matches_whole_value() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("priority");
        filters.set_filter_value("priority", FilterValue::Text("low".to_owned()));
        assert!(filters.matches(&record("a", json!({"priority": "low"}))));
        assert!(!filters.matches(&record("b", json!({"priority": "lowest"}))));
    }

    #[test]
    fn filters_compose_with_and() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("problemDescription");
        filters.add_filter("callBack");
        filters.set_filter_value("problemDescription", FilterValue::Text("login".to_owned()));
        filters.set_filter_value("callBack", FilterValue::Text("true".to_owned()));

        let both = record("a", json!({"problemDescription": "login", "callBack": true}));
        let one = record("b", json!({"problemDescription": "login", "callBack": false}));
        assert!(filters.matches(&both));
        assert!(!filters.matches(&one));

        let records = vec![both.clone(), one.clone()];
        assert_eq!(filters.filter(&records), vec![&records[0]]);

        filters.remove_filter("problemDescription");
        filters.remove_filter("callBack");
        assert!(filters.matches(&one));
    }

    #[test]
    fn adding_twice_keeps_one_filter_and_unknown_names_are_refused() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        assert!(filters.add_filter("contractNumber"));
        assert!(!filters.add_filter("contractNumber"));
        assert_eq!(filters.active().len(), 1);

        assert!(!filters.add_filter("missing"));
        assert!(!filters.add_filter("intro"));
        assert!(!filters.remove_filter("missing"));
        assert!(!filters.set_filter_value("callBack", FilterValue::Text("true".to_owned())));
    }

    #[test]
    fn value_shape_must_fit_field_type() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("installDate");
        filters.add_filter("contractNumber");
        assert!(!filters.set_filter_value("installDate", FilterValue::Text("2024".to_owned())));
        assert!(!filters.set_filter_value(
            "contractNumber",
            FilterValue::Range(DateRange::default())
        ));
    }

    #[test]
    fn filters_on_fields_missing_from_rebound_schema_are_skipped() {
        let original = schema();
        let replacement = FieldSet::new(vec![
            FieldSchema::new("contractNumber", "Contract Number", FieldKind::String),
        ]);
        let mut filters = FilterEngine::new(&original, Codec::UTC);
        filters.add_filter("problemDescription");
        filters.add_filter("contractNumber");
        filters.set_filter_value("problemDescription", FilterValue::Text("login".to_owned()));
        filters.set_filter_value("contractNumber", FilterValue::Text("1".to_owned()));

        filters.rebind(&replacement);
        assert!(filters.matches(&record("a", json!({"problemDescription": "billing"}))));
        assert_eq!(filters.active().len(), 2);
    }

    #[test]
    fn controls_drive_filter_values() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("installDate");
        filters.add_filter("callBack");

        let controls = filters.controls();
        assert_eq!(controls.len(), 2);
        assert!(matches!(controls[0].widget, Widget::DateTimeRange { .. }));

        let edit = controls[0]
            .accept(Input::From("2024-01-01T00:00".to_owned()))
            .expect("range accepts from");
        assert!(filters.set_filter_input("installDate", edit));
        assert_eq!(
            filters.get("installDate").map(|filter| &filter.value),
            Some(&FilterValue::Range(DateRange::new("2024-01-01T00:00:00Z", "")))
        );

        let choose = controls[1]
            .accept(Input::Choose("true".to_owned()))
            .expect("boolean filter offers true");
        assert!(filters.set_filter_input("callBack", choose));
        assert!(!filters.set_filter_input("callBack", EditValue::Inert));
        assert!(filters.matches(&record(
            "a",
            json!({"callBack": true, "installDate": "2024-03-01T00:00:00Z"})
        )));
    }

    #[test]
    fn hidden_fields_cannot_be_filtered() {
        let mut secret = FieldSchema::new("internalNote", "Internal Note", FieldKind::String);
        secret.visible = false;
        let fields = FieldSet::new(vec![
            secret,
            FieldSchema::new("contractNumber", "Contract Number", FieldKind::Number),
        ]);
        let mut filters = FilterEngine::new(&fields, Codec::UTC);

        assert!(!filters.add_filter("internalNote"));
        assert!(filters.active().is_empty());
        assert!(!filters.set_filter_value("internalNote", FilterValue::Text("x".to_owned())));
        let names: Vec<&str> = filters
            .available_fields()
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(names, vec!["contractNumber"]);
    }

    #[test]
    fn available_fields_exclude_active_and_structural_fields() {
        let fields = schema();
        let mut filters = FilterEngine::new(&fields, Codec::UTC);
        filters.add_filter("callBack");
        let names: Vec<&str> = filters
            .available_fields()
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["problemDescription", "contractNumber", "installDate", "priority"]
        );
    }
}
