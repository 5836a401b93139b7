// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use orderdesk_app::render::leaf_controls;
use orderdesk_app::{
    Codec, DataMap, DateRange, EditValue, FieldSet, FilterEngine, FilterValue, FormEngine, Input,
    Mode, OrderType, RenderContext, Submission, SubmitOutcome, render::render_fields,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;

fn survey() -> Result<OrderType> {
    Ok(serde_json::from_value(json!({
        "id": 9,
        "code": "install",
        "name": "Install",
        "active": true,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z",
        "fields": {
            "customerName": {"type": "string", "label": "Customer Name", "required": true},
            "installDate": {"type": "datetime", "label": "Install Date", "required": true},
            "site": {"type": "group", "label": "Site", "fields": [
                {"name": "floor", "type": "number", "label": "Floor", "required": true},
                {"name": "access", "type": "select", "label": "Access", "nullable": true,
                 "choices": [["stairs", "Stairs"], ["lift", "Lift"]]}
            ]},
            "problemDescription": {"type": "string", "label": "Problem Description"}
        }
    }))?)
}

fn record(code: &str, data: Value) -> Submission {
    Submission {
        code: code.to_owned(),
        data: match data {
            Value::Object(map) => map,
            _ => DataMap::new(),
        },
    }
}

#[test]
fn form_collects_nested_values_and_submits_once() -> Result<()> {
    let order_type = survey()?;
    let mut form = FormEngine::blank(&order_type.fields, Codec::UTC);

    let blocked = form.submit_with(|_| Ok(()));
    let SubmitOutcome::Invalid(errors) = blocked else {
        panic!("blank form must not submit");
    };
    assert_eq!(
        errors,
        BTreeMap::from([
            ("customerName".to_owned(), "Customer Name is required".to_owned()),
            ("floor".to_owned(), "Floor is required".to_owned()),
            ("installDate".to_owned(), "Install Date is required".to_owned()),
        ])
    );

    let controls = form.controls();
    let edits: Vec<(String, EditValue)> = leaf_controls(&controls)
        .into_iter()
        .filter_map(|control| {
            let input = match control.name.as_str() {
                "customerName" => Input::Text("John Doe".to_owned()),
                "installDate" => Input::Text("2024-02-01T10:00".to_owned()),
                "floor" => Input::Text("3".to_owned()),
                "access" => Input::Choose("lift".to_owned()),
                _ => return None,
            };
            control.accept(input).map(|edit| (control.name.clone(), edit))
        })
        .collect();
    assert_eq!(edits.len(), 4);
    for (name, edit) in edits {
        assert!(form.set_field(&name, edit), "edit {name} accepted");
    }
    assert!(form.errors().is_empty());

    let sent = RefCell::new(Vec::new());
    let outcome = form.submit_with(|values| {
        sent.borrow_mut().push(values.clone());
        Ok("ORD-1004")
    });
    assert_eq!(outcome, SubmitOutcome::Committed("ORD-1004"));

    let sent = sent.into_inner();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].get("installDate"), Some(&json!("2024-02-01T10:00:00Z")));
    assert_eq!(sent[0].get("floor"), Some(&json!(3)));
    assert_eq!(sent[0].get("access"), Some(&json!("lift")));
    assert_eq!(sent[0].get("problemDescription"), Some(&json!("")));
    Ok(())
}

#[test]
fn filter_panel_narrows_records_and_survives_schema_change() -> Result<()> {
    let order_type = survey()?;
    let records = vec![
        record(
            "ORD-1",
            json!({"problemDescription": "System login issues", "installDate": "2024-02-01T10:00:00Z", "floor": 2}),
        ),
        record(
            "ORD-2",
            json!({"problemDescription": "Billing question", "installDate": "2023-12-01T00:00:00Z", "floor": 2}),
        ),
        record("ORD-3", json!({"problemDescription": "login again"})),
    ];

    let mut filters = FilterEngine::new(&order_type.fields, Codec::UTC);
    assert_eq!(filters.filter(&records).len(), 3);

    filters.add_filter("problemDescription");
    filters.add_filter("problemDescription");
    assert_eq!(filters.active().len(), 1);
    filters.set_filter_value("problemDescription", FilterValue::Text("login".to_owned()));
    let codes: Vec<&str> = filters.filter(&records).iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["ORD-1", "ORD-3"]);

    filters.add_filter("installDate");
    filters.set_filter_value(
        "installDate",
        FilterValue::Range(DateRange::new("2024-01-01T00:00:00Z", "")),
    );
    let codes: Vec<&str> = filters.filter(&records).iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["ORD-1", "ORD-3"]);

    let narrowed: FieldSet = serde_json::from_value(json!({
        "installDate": {"type": "datetime", "label": "Install Date"}
    }))?;
    filters.rebind(&narrowed);
    let codes: Vec<&str> = filters.filter(&records).iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["ORD-1", "ORD-3"]);
    assert_eq!(filters.controls().len(), 1);

    filters.reset();
    assert_eq!(filters.filter(&records).len(), 3);
    Ok(())
}

#[test]
fn display_render_is_stable_for_the_same_record() -> Result<()> {
    let order_type = survey()?;
    let data = record(
        "ORD-1",
        json!({"customerName": "John Doe", "installDate": "2024-02-01T10:00:00Z", "access": "lift"}),
    )
    .data;
    let errors = BTreeMap::new();
    let ctx = RenderContext::new(Codec::UTC, &data, &errors);

    let first = render_fields(&order_type.fields, Mode::Display, ctx);
    let second = render_fields(&order_type.fields, Mode::Display, ctx);
    assert_eq!(first, second);

    let texts: Vec<(&str, &str)> = leaf_controls(&first)
        .into_iter()
        .filter_map(|control| control.text().map(|text| (control.name.as_str(), text)))
        .collect();
    assert_eq!(
        texts,
        vec![
            ("customerName", "John Doe"),
            ("installDate", "2/1/2024, 10:00:00 AM"),
            ("floor", "—"),
            ("access", "Lift"),
            ("problemDescription", "—"),
        ]
    );
    Ok(())
}
