// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::codec::{empty_value, is_empty_value};
use crate::render::{Control, Mode, RenderContext, render_fields};
use crate::{Codec, DataMap, EditValue, FieldSet, SubmitError};

/// Field name to message.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Idle,
    Submitting,
    Committed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome<T> {
    /// Required fields are empty; nothing was sent.
    Invalid(FieldErrors),
    /// A submit is already in flight.
    Busy,
    Committed(T),
    Failed(String),
    /// The form was cancelled or closed before the outcome arrived.
    Discarded,
}

/// Read-only view for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormSnapshot<'a> {
    pub values: &'a DataMap,
    pub errors: &'a FieldErrors,
    pub submit_error: Option<&'a str>,
    pub is_submitting: bool,
}

/// Binds a field schema to one mutable value map. The schema is fixed for
/// the engine's lifetime, borrowed or owned; a new schema needs a new engine.
#[derive(Debug, Clone)]
pub struct FormEngine<'a> {
    fields: Cow<'a, FieldSet>,
    codec: Codec,
    values: DataMap,
    errors: FieldErrors,
    submit_error: Option<String>,
    phase: FormPhase,
}

impl<'a> FormEngine<'a> {
    /// Seeds values from `initial`; leaves it lacks get their type's empty
    /// value. Keys outside the schema are kept as-is.
    pub fn new(fields: impl Into<Cow<'a, FieldSet>>, initial: &DataMap, codec: Codec) -> Self {
        let fields = fields.into();
        let mut values = initial.clone();
        for field in fields.leaves() {
            if values.contains_key(&field.name) {
                continue;
            }
            if let Some(empty) = empty_value(field) {
                values.insert(field.name.clone(), empty);
            }
        }
        Self {
            fields,
            codec,
            values,
            errors: FieldErrors::new(),
            submit_error: None,
            phase: FormPhase::Idle,
        }
    }

    pub fn blank(fields: impl Into<Cow<'a, FieldSet>>, codec: Codec) -> Self {
        Self::new(fields, &DataMap::new(), codec)
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == FormPhase::Submitting
    }

    pub fn values(&self) -> &DataMap {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn dismiss_submit_error(&mut self) {
        self.submit_error = None;
    }

    /// Applies one edit through the codec and clears that field's error.
    /// Returns false when the edit was refused: unknown, static, group or
    /// read-only field, or a form that is not idle.
    pub fn set_field(&mut self, name: &str, edit: EditValue) -> bool {
        if self.phase != FormPhase::Idle {
            debug!(field = name, phase = ?self.phase, "edit refused; form not idle");
            return false;
        }
        let Some(field) = self.fields.leaf(name) else {
            debug!(field = name, "edit refused; no such value field");
            return false;
        };
        if !field.editable {
            debug!(field = name, "edit refused; field is read-only");
            return false;
        }

        let value = self.codec.from_editable(edit, field);
        self.values.insert(field.name.clone(), value);
        self.errors.remove(name);
        true
    }

    /// Required-only validation over every leaf, groups included. Replaces
    /// the current error map and returns it.
    pub fn validate(&mut self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in self.fields.leaves() {
            if field.required && is_empty_value(self.values.get(&field.name)) {
                errors.insert(
                    field.name.clone(),
                    format!("{} is required", field.display_label()),
                );
            }
        }
        self.errors = errors.clone();
        errors
    }

    /// Validates and, when clean, moves to `Submitting` and hands back the
    /// values to send. The caller reports the collaborator's answer through
    /// [`FormEngine::complete_submit`].
    pub fn begin_submit<T>(&mut self) -> Result<DataMap, SubmitOutcome<T>> {
        match self.phase {
            FormPhase::Submitting => return Err(SubmitOutcome::Busy),
            FormPhase::Committed | FormPhase::Cancelled => return Err(SubmitOutcome::Discarded),
            FormPhase::Idle => {}
        }

        let errors = self.validate();
        if !errors.is_empty() {
            debug!(count = errors.len(), "submit blocked by validation");
            return Err(SubmitOutcome::Invalid(errors));
        }

        self.phase = FormPhase::Submitting;
        self.submit_error = None;
        info!(fields = self.values.len(), "form submit started");
        Ok(self.values.clone())
    }

    pub fn complete_submit<T>(&mut self, result: Result<T, SubmitError>) -> SubmitOutcome<T> {
        match self.phase {
            FormPhase::Submitting => {}
            FormPhase::Cancelled => {
                info!(ok = result.is_ok(), "submit finished after cancel; outcome ignored");
                return SubmitOutcome::Discarded;
            }
            phase => {
                warn!(?phase, "submit outcome with no submit in flight; ignored");
                return SubmitOutcome::Discarded;
            }
        }

        match result {
            Ok(saved) => {
                self.phase = FormPhase::Committed;
                info!("form submit committed");
                SubmitOutcome::Committed(saved)
            }
            Err(error) => {
                let message = error.to_string();
                warn!(%error, "form submit failed");
                self.phase = FormPhase::Idle;
                self.submit_error = Some(message.clone());
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Full submit against a synchronous collaborator. It is not called when
    /// validation fails.
    pub fn submit_with<T>(
        &mut self,
        submit: impl FnOnce(&DataMap) -> Result<T, SubmitError>,
    ) -> SubmitOutcome<T> {
        match self.begin_submit() {
            Ok(values) => {
                let result = submit(&values);
                self.complete_submit(result)
            }
            Err(outcome) => outcome,
        }
    }

    /// Discards values and errors. Returns whether a submit was in flight;
    /// that call still runs but its outcome will be discarded.
    pub fn cancel(&mut self) -> bool {
        let in_flight = self.phase == FormPhase::Submitting;
        self.values.clear();
        self.errors.clear();
        self.submit_error = None;
        self.phase = FormPhase::Cancelled;
        if in_flight {
            info!("form cancelled with submit in flight");
        }
        in_flight
    }

    pub fn snapshot(&self) -> FormSnapshot<'_> {
        FormSnapshot {
            values: &self.values,
            errors: &self.errors,
            submit_error: self.submit_error.as_deref(),
            is_submitting: self.is_submitting(),
        }
    }

    /// Edit-mode controls; every control is disabled while submitting.
    pub fn controls(&self) -> Vec<Control> {
        let ctx = RenderContext::new(self.codec, &self.values, &self.errors)
            .locked(self.phase != FormPhase::Idle);
        render_fields(&self.fields, Mode::Edit, ctx)
    }
}
