// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use std::collections::BTreeMap;

use crate::codec::plain_text;
use crate::{Codec, DataMap, DateRange, EditValue, FieldKind, FieldSchema, FieldSet};

const JSON_ROWS: u16 = 4;
const JSON_PLACEHOLDER: &str = "Enter valid JSON";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Edit,
    Display,
    Filter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    TextInput {
        value: String,
        placeholder: Option<String>,
    },
    NumberInput {
        value: String,
    },
    TextArea {
        value: String,
        rows: u16,
        placeholder: Option<String>,
    },
    Toggle {
        checked: bool,
    },
    /// Local minute-precision input, `YYYY-MM-DDTHH:MM`.
    DateTime {
        value: String,
    },
    DateTimeRange {
        from: String,
        to: String,
    },
    Choice {
        selected: String,
        options: Vec<SelectOption>,
    },
    Static {
        html: String,
    },
    Section {
        label: String,
        children: Vec<Control>,
    },
    Text {
        text: String,
    },
}

/// An operator gesture against one control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Replaces the whole text of a text-like control.
    Text(String),
    Toggle,
    Choose(String),
    From(String),
    To(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub disabled: bool,
    pub error: Option<String>,
    pub widget: Widget,
}

impl Control {
    /// Translates an input into the edit value it produces, if the control
    /// accepts it. Disabled, static, section and display controls accept
    /// nothing.
    pub fn accept(&self, input: Input) -> Option<EditValue> {
        if self.disabled {
            return None;
        }
        match (&self.widget, input) {
            (
                Widget::TextInput { .. }
                | Widget::NumberInput { .. }
                | Widget::TextArea { .. }
                | Widget::DateTime { .. },
                Input::Text(text),
            ) => Some(EditValue::Text(text)),
            (Widget::Toggle { checked }, Input::Toggle) => Some(EditValue::Flag(!checked)),
            (Widget::Choice { options, .. }, Input::Choose(value)) => options
                .iter()
                .any(|option| option.value == value)
                .then_some(EditValue::Text(value)),
            (Widget::DateTimeRange { to, .. }, Input::From(from)) => Some(EditValue::Range {
                from,
                to: to.clone(),
            }),
            (Widget::DateTimeRange { from, .. }, Input::To(to)) => Some(EditValue::Range {
                from: from.clone(),
                to,
            }),
            _ => None,
        }
    }

    /// Current text of a text-like control.
    pub fn text(&self) -> Option<&str> {
        match &self.widget {
            Widget::TextInput { value, .. }
            | Widget::NumberInput { value }
            | Widget::TextArea { value, .. }
            | Widget::DateTime { value } => Some(value),
            Widget::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        !self.disabled && !matches!(self.widget, Widget::Static { .. } | Widget::Section { .. })
    }

    /// Controls bound to a value, flattened out of sections in order.
    pub fn leaves(&self) -> Vec<&Control> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(control: &'a Control, out: &mut Vec<&'a Control>) {
    match &control.widget {
        Widget::Section { children, .. } => {
            for child in children {
                collect_leaves(child, out);
            }
        }
        Widget::Static { .. } => {}
        _ => out.push(control),
    }
}

/// Flattened value-bearing controls across a rendered field list.
pub fn leaf_controls(controls: &[Control]) -> Vec<&Control> {
    controls.iter().flat_map(Control::leaves).collect()
}

/// What a render pass reads. In filter mode `values` holds filter values:
/// text for scalars and a `{from, to}` object for datetimes.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub codec: Codec,
    pub values: &'a DataMap,
    pub errors: &'a BTreeMap<String, String>,
    pub locked: bool,
}

impl<'a> RenderContext<'a> {
    pub fn new(codec: Codec, values: &'a DataMap, errors: &'a BTreeMap<String, String>) -> Self {
        Self {
            codec,
            values,
            errors,
            locked: false,
        }
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }
}

pub fn render_fields(fields: &FieldSet, mode: Mode, ctx: RenderContext<'_>) -> Vec<Control> {
    render_slice(fields.as_slice(), mode, ctx)
}

fn render_slice(fields: &[FieldSchema], mode: Mode, ctx: RenderContext<'_>) -> Vec<Control> {
    fields
        .iter()
        .filter_map(|field| render_field(field, mode, ctx))
        .collect()
}

/// Control description for one field. `None` when the field has no
/// presence in the mode: hidden fields outside edit mode, and static or
/// group fields in filter mode.
pub fn render_field(field: &FieldSchema, mode: Mode, ctx: RenderContext<'_>) -> Option<Control> {
    if !field.visible && mode != Mode::Edit {
        return None;
    }

    let value = ctx.values.get(&field.name);
    let widget = match mode {
        Mode::Display => display_widget(field, value, ctx),
        Mode::Edit => edit_widget(field, value, ctx),
        Mode::Filter => filter_widget(field, value, ctx)?,
    };
    let disabled = match mode {
        Mode::Display => true,
        Mode::Edit => ctx.locked || !field.editable,
        Mode::Filter => ctx.locked,
    };

    Some(Control {
        name: field.name.clone(),
        label: field.display_label().to_owned(),
        description: field.description.clone(),
        required: field.required && mode == Mode::Edit,
        disabled,
        error: ctx.errors.get(&field.name).cloned(),
        widget,
    })
}

fn edit_widget(field: &FieldSchema, value: Option<&Value>, ctx: RenderContext<'_>) -> Widget {
    let edit = ctx.codec.to_editable(value, field);
    let text = match &edit {
        EditValue::Text(text) => text.clone(),
        _ => String::new(),
    };

    match &field.kind {
        FieldKind::String => Widget::TextInput {
            value: text,
            placeholder: field.placeholder.clone(),
        },
        FieldKind::Number => Widget::NumberInput { value: text },
        FieldKind::Boolean => Widget::Toggle {
            checked: edit == EditValue::Flag(true),
        },
        FieldKind::Datetime => Widget::DateTime { value: text },
        FieldKind::Json => Widget::TextArea {
            value: text,
            rows: JSON_ROWS,
            placeholder: Some(
                field
                    .placeholder
                    .clone()
                    .unwrap_or_else(|| JSON_PLACEHOLDER.to_owned()),
            ),
        },
        FieldKind::Text { rows } => Widget::TextArea {
            value: text,
            rows: *rows,
            placeholder: field.placeholder.clone(),
        },
        FieldKind::Select { choices, nullable } => {
            let mut options = Vec::with_capacity(choices.len() + 1);
            if *nullable {
                options.push(SelectOption::new("", "Select..."));
            }
            options.extend(
                choices
                    .iter()
                    .map(|choice| SelectOption::new(&choice.value, &choice.label)),
            );
            Widget::Choice {
                selected: text,
                options,
            }
        }
        FieldKind::Static { html } => Widget::Static { html: html.clone() },
        FieldKind::Group { fields } => Widget::Section {
            label: field.display_label().to_owned(),
            children: render_fields(fields, Mode::Edit, ctx),
        },
    }
}

fn display_widget(
    field: &FieldSchema,
    value: Option<&Value>,
    ctx: RenderContext<'_>,
) -> Widget {
    match &field.kind {
        FieldKind::Static { html } => Widget::Static { html: html.clone() },
        FieldKind::Group { fields } => Widget::Section {
            label: field.display_label().to_owned(),
            children: render_fields(fields, Mode::Display, ctx),
        },
        FieldKind::Select { choices, .. } => {
            let raw = plain_text(value);
            let text = match choices.iter().find(|choice| choice.value == raw) {
                Some(choice) => choice.label.clone(),
                None => ctx.codec.format(value, field),
            };
            Widget::Text { text }
        }
        _ => Widget::Text {
            text: ctx.codec.format(value, field),
        },
    }
}

fn filter_widget(
    field: &FieldSchema,
    value: Option<&Value>,
    ctx: RenderContext<'_>,
) -> Option<Widget> {
    let text = plain_text(value);
    Some(match &field.kind {
        FieldKind::Static { .. } | FieldKind::Group { .. } => return None,
        FieldKind::Datetime => {
            let range = value
                .and_then(|value| serde_json::from_value::<DateRange>(value.clone()).ok())
                .unwrap_or_default();
            match ctx.codec.range_to_editable(&range) {
                EditValue::Range { from, to } => Widget::DateTimeRange { from, to },
                _ => Widget::DateTimeRange {
                    from: String::new(),
                    to: String::new(),
                },
            }
        }
        FieldKind::Boolean => Widget::Choice {
            selected: text,
            options: vec![
                SelectOption::new("", "All"),
                SelectOption::new("true", "Yes"),
                SelectOption::new("false", "No"),
            ],
        },
        FieldKind::Select { choices, .. } => {
            let mut options = vec![SelectOption::new("", "All")];
            options.extend(
                choices
                    .iter()
                    .map(|choice| SelectOption::new(&choice.value, &choice.label)),
            );
            Widget::Choice {
                selected: text,
                options,
            }
        }
        FieldKind::Number => Widget::NumberInput { value: text },
        FieldKind::String | FieldKind::Text { .. } | FieldKind::Json => Widget::TextInput {
            value: text,
            placeholder: Some(format!("Filter by {}", field.display_label())),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::{
        Control, Input, Mode, RenderContext, Widget, leaf_controls, render_field, render_fields,
    };
    use crate::{Choice, Codec, DataMap, EditValue, FieldKind, FieldSchema, FieldSet};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn values(value: serde_json::Value) -> DataMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => DataMap::new(),
        }
    }

    fn render(field: &FieldSchema, mode: Mode, data: &DataMap) -> Option<Control> {
        let errors = BTreeMap::new();
        render_field(field, mode, RenderContext::new(Codec::UTC, data, &errors))
    }

    #[test]
    fn edit_dispatch_covers_every_kind() {
        let data = values(json!({
            "name": "Jane",
            "count": 3,
            "vip": true,
            "installDate": "2024-02-01T10:00:00Z",
            "meta": {"a": 1},
            "channel": "sms",
            "notes": "line"
        }));
        let cases = [
            (FieldSchema::new("name", "Name", FieldKind::String), "TextInput"),
            (FieldSchema::new("count", "Count", FieldKind::Number), "NumberInput"),
            (FieldSchema::new("vip", "VIP", FieldKind::Boolean), "Toggle"),
            (FieldSchema::new("installDate", "Install", FieldKind::Datetime), "DateTime"),
            (FieldSchema::new("meta", "Meta", FieldKind::Json), "TextArea"),
            (
                FieldSchema::new("channel", "Channel", FieldKind::select(vec![], false)),
                "Choice",
            ),
            (FieldSchema::new("notes", "Notes", FieldKind::text()), "TextArea"),
            (
                FieldSchema::new("intro", "", FieldKind::Static { html: "<p>hi</p>".to_owned() }),
                "Static",
            ),
            (FieldSchema::new("box", "Box", FieldKind::group(vec![])), "Section"),
        ];

        for (field, expected) in cases {
            let control = render(&field, Mode::Edit, &data).expect("edit renders every field");
            let actual = match control.widget {
                Widget::TextInput { .. } => "TextInput",
                Widget::NumberInput { .. } => "NumberInput",
                Widget::TextArea { .. } => "TextArea",
                Widget::Toggle { .. } => "Toggle",
                Widget::DateTime { .. } => "DateTime",
                Widget::DateTimeRange { .. } => "DateTimeRange",
                Widget::Choice { .. } => "Choice",
                Widget::Static { .. } => "Static",
                Widget::Section { .. } => "Section",
                Widget::Text { .. } => "Text",
            };
            assert_eq!(actual, expected, "widget for {}", field.name);
        }
    }

    #[test]
    fn json_text_area_has_default_placeholder() {
        let field = FieldSchema::new("meta", "Meta", FieldKind::Json);
        let control = render(&field, Mode::Edit, &DataMap::new()).expect("renders");
        assert_eq!(
            control.widget,
            Widget::TextArea {
                value: String::new(),
                rows: 4,
                placeholder: Some("Enter valid JSON".to_owned()),
            }
        );
    }

    #[test]
    fn nullable_select_offers_empty_choice_and_rejects_unknown_values() {
        let field = FieldSchema::new(
            "channel",
            "Channel",
            FieldKind::select(vec![Choice::new("sms", "SMS"), Choice::new("call", "Call")], true),
        );
        let control = render(&field, Mode::Edit, &DataMap::new()).expect("renders");
        let Widget::Choice { options, .. } = &control.widget else {
            panic!("select renders a choice");
        };
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].value, "");

        assert_eq!(
            control.accept(Input::Choose("call".to_owned())),
            Some(EditValue::Text("call".to_owned()))
        );
        assert_eq!(
            control.accept(Input::Choose(String::new())),
            Some(EditValue::Text(String::new()))
        );
        assert_eq!(control.accept(Input::Choose("fax".to_owned())), None);
    }

    #[test]
    fn read_only_and_locked_controls_accept_nothing() {
        let read_only = FieldSchema::new("code", "Code", FieldKind::String).read_only();
        let control = render(&read_only, Mode::Edit, &DataMap::new()).expect("renders");
        assert!(control.disabled);
        assert_eq!(control.accept(Input::Text("x".to_owned())), None);

        let errors = BTreeMap::new();
        let data = DataMap::new();
        let editable = FieldSchema::new("name", "Name", FieldKind::String);
        let locked = render_field(
            &editable,
            Mode::Edit,
            RenderContext::new(Codec::UTC, &data, &errors).locked(true),
        )
        .expect("renders");
        assert!(!locked.is_interactive());
    }

    #[test]
    fn toggle_flips_current_state() {
        let field = FieldSchema::new("vip", "VIP", FieldKind::Boolean);
        let control = render(&field, Mode::Edit, &values(json!({"vip": true}))).expect("renders");
        assert_eq!(control.accept(Input::Toggle), Some(EditValue::Flag(false)));
        assert_eq!(control.accept(Input::Text("x".to_owned())), None);
    }

    #[test]
    fn display_mode_formats_values_and_uses_choice_labels() {
        let data = values(json!({"vip": false, "channel": "sms", "when": "2024-02-01T10:00:00Z"}));
        let fields = FieldSet::new(vec![
            FieldSchema::new("vip", "VIP", FieldKind::Boolean),
            FieldSchema::new(
                "channel",
                "Channel",
                FieldKind::select(vec![Choice::new("sms", "SMS")], false),
            ),
            FieldSchema::new("when", "When", FieldKind::Datetime),
            FieldSchema::new("missing", "Missing", FieldKind::String),
        ]);
        let errors = BTreeMap::new();
        let controls = render_fields(
            &fields,
            Mode::Display,
            RenderContext::new(Codec::UTC, &data, &errors),
        );
        let texts: Vec<&str> = controls.iter().filter_map(Control::text).collect();
        assert_eq!(texts, vec!["No", "SMS", "2/1/2024, 10:00:00 AM", "—"]);
        assert!(controls.iter().all(|control| control.disabled));
    }

    #[test]
    fn hidden_fields_render_only_in_edit_mode() {
        let mut field = FieldSchema::new("secret", "Secret", FieldKind::String);
        field.visible = false;
        let data = DataMap::new();
        assert!(render(&field, Mode::Edit, &data).is_some());
        assert!(render(&field, Mode::Display, &data).is_none());
        assert!(render(&field, Mode::Filter, &data).is_none());
    }

    #[test]
    fn filter_mode_differs_for_datetime_and_omits_structure() {
        let data = values(json!({"installDate": {"from": "2024-01-01T00:00:00Z", "to": ""}}));
        let datetime = FieldSchema::new("installDate", "Install", FieldKind::Datetime);
        let control = render(&datetime, Mode::Filter, &data).expect("datetime filter renders");
        assert_eq!(
            control.widget,
            Widget::DateTimeRange {
                from: "2024-01-01T00:00".to_owned(),
                to: String::new(),
            }
        );
        assert_eq!(
            control.accept(Input::To("2024-03-01T00:00".to_owned())),
            Some(EditValue::Range {
                from: "2024-01-01T00:00".to_owned(),
                to: "2024-03-01T00:00".to_owned(),
            })
        );

        let stat = FieldSchema::new("intro", "", FieldKind::Static { html: String::new() });
        let group = FieldSchema::new("box", "Box", FieldKind::group(vec![]));
        assert!(render(&stat, Mode::Filter, &data).is_none());
        assert!(render(&group, Mode::Filter, &data).is_none());
    }

    #[test]
    fn read_only_fields_remain_filterable() {
        let field = FieldSchema::new("code", "Code", FieldKind::String).read_only();
        let control = render(&field, Mode::Filter, &DataMap::new()).expect("renders");
        assert!(!control.disabled);
    }

    #[test]
    fn groups_recurse_and_carry_errors_to_children() {
        let fields = FieldSet::new(vec![FieldSchema::new(
            "contact",
            "Contact",
            FieldKind::group(vec![
                FieldSchema::new("phone", "Phone", FieldKind::String).required(),
                FieldSchema::new("intro", "", FieldKind::Static { html: "x".to_owned() }),
            ]),
        )]);
        let data = DataMap::new();
        let errors = BTreeMap::from([("phone".to_owned(), "Phone is required".to_owned())]);
        let controls = render_fields(
            &fields,
            Mode::Edit,
            RenderContext::new(Codec::UTC, &data, &errors),
        );

        let leaves = leaf_controls(&controls);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].name, "phone");
        assert!(leaves[0].required);
        assert_eq!(leaves[0].error.as_deref(), Some("Phone is required"));
    }
}
