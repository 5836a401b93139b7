// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::ids::*;
use crate::{DataMap, FieldSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    ToExecute,
    InProgress,
    Done,
}

impl OrderState {
    pub const ALL: [Self; 3] = [Self::ToExecute, Self::InProgress, Self::Done];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToExecute => "to_execute",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "to_execute" => Some(Self::ToExecute),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ToExecute => "New",
            Self::InProgress => "In Progress",
            Self::Done => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Vip,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub department: String,
    pub role: UserRole,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub external: bool,
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name).trim().to_owned()
    }
}

/// A named field schema governing the custom data of one class of orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderType {
    pub id: OrderTypeId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub fields: FieldSet,
    #[serde(default)]
    pub print_form_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub code: String,
    #[serde(default)]
    pub ext_code: Option<String>,
    #[serde(default)]
    pub bp_id: Option<String>,
    #[serde(default)]
    pub bp_state: Option<String>,
    pub state: OrderState,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub done_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub estimated_exec_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub data: DataMap,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub order_type: OrderType,
    #[serde(default)]
    pub user: Option<User>,
}

/// A workflow inbox item pointing at the entity it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due: Option<OffsetDateTime>,
    #[serde(default)]
    pub priority: i32,
    pub process_name: String,
    pub process_key: String,
    pub entity_code: String,
    #[serde(default)]
    pub entity_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Anything owning a dynamic data map interpretable through a field schema.
pub trait Record {
    fn code(&self) -> &str;
    fn data(&self) -> &DataMap;

    fn field(&self, name: &str) -> Option<&Value> {
        self.data().get(name)
    }
}

impl Record for Order {
    fn code(&self) -> &str {
        &self.code
    }

    fn data(&self) -> &DataMap {
        &self.data
    }
}

/// Data entered against a task form, keyed by the task it completes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Submission {
    pub code: String,
    pub data: DataMap,
}

impl Record for Submission {
    fn code(&self) -> &str {
        &self.code
    }

    fn data(&self) -> &DataMap {
        &self.data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Orders,
    Tasks,
    OrderTypes,
}

impl TabKind {
    pub const ALL: [Self; 3] = [Self::Orders, Self::Tasks, Self::OrderTypes];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Tasks => "tasks",
            Self::OrderTypes => "order types",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Detail,
    Form,
    Filter,
}
