// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::{DataMap, FieldSet, Order, OrderState, OrderType, OrderTypeId, Task, TaskId};

/// Why a collaborator refused or failed to persist a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The backend validated the draft and turned it down.
    Rejected(String),
    Network(String),
    SessionExpired,
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(message) => f.write_str(message),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::SessionExpired => f.write_str("session expired -- sign in again and resubmit"),
        }
    }
}

impl std::error::Error for SubmitError {}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListCriteria {
    pub state: Option<OrderState>,
    pub archived: Option<bool>,
    pub search: Option<String>,
}

impl ListCriteria {
    pub fn active() -> Self {
        Self {
            archived: Some(false),
            ..Self::default()
        }
    }

    /// Search is a case-insensitive substring over the code and type name.
    pub fn matches(&self, order: &Order) -> bool {
        if self.state.is_some_and(|state| state != order.state) {
            return false;
        }
        if self.archived.is_some_and(|archived| archived != order.archived) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(query) => {
                let query = query.to_lowercase();
                order.code.to_lowercase().contains(&query)
                    || order.order_type.name.to_lowercase().contains(&query)
            }
        }
    }
}

/// A new or edited order awaiting persistence. `code` is set for edits.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub code: Option<String>,
    pub order_type_id: OrderTypeId,
    pub data: DataMap,
}

impl OrderDraft {
    pub fn create(order_type_id: OrderTypeId, data: DataMap) -> Self {
        Self {
            code: None,
            order_type_id,
            data,
        }
    }

    pub fn update(order: &Order, data: DataMap) -> Self {
        Self {
            code: Some(order.code.clone()),
            order_type_id: order.order_type.id,
            data,
        }
    }
}

/// A task together with the form its completion requires.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub task: Task,
    pub fields: FieldSet,
}

pub trait RecordSource {
    fn list(&mut self, criteria: &ListCriteria) -> Result<Vec<Order>>;
    fn get_by_code(&mut self, code: &str) -> Result<Order>;
    fn submit(&mut self, draft: &OrderDraft) -> Result<Order, SubmitError>;
}

pub trait SchemaSource {
    fn list_schemas(&mut self) -> Result<Vec<OrderType>>;
}

pub trait TaskSource {
    fn list_tasks(&mut self) -> Result<Vec<Task>>;
    fn task_form(&mut self, task: &Task) -> Result<TaskForm>;
    fn submit_task(&mut self, task: &Task, data: &DataMap) -> Result<(), SubmitError>;
    fn claim_task(&mut self, task: &Task) -> Result<()>;
}

/// Looks up a task by id in an already-fetched inbox.
pub fn find_task<'a>(tasks: &'a [Task], id: &TaskId) -> Option<&'a Task> {
    tasks.iter().find(|task| &task.id == id)
}
