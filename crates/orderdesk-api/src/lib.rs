// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use orderdesk_app::{
    DataMap, FieldSet, ListCriteria, Order, OrderDraft, OrderType, OrderTypeId, RecordSource,
    SchemaSource, Session, SubmitError, Task, TaskForm, TaskSource, User,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exchanges credentials for a session carrying the user's API token.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let url = self.endpoint(&["users", "sign_in"])?;
        let body = SignInBody {
            user: Credentials { email, password },
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        debug!(%status, "sign in");
        if status == StatusCode::UNAUTHORIZED {
            bail!("invalid email or password -- check your credentials and retry");
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let user: User = response.json().context("decode signed-in user")?;
        let token = user
            .api_token
            .clone()
            .ok_or_else(|| anyhow!("sign-in response has no api token"))?;
        info!(email = %user.email, "signed in");
        Session::new(token, user)
    }

    /// Ends the session server-side. The session is consumed either way.
    pub fn sign_out(&self, session: Session) -> Result<()> {
        let url = self.endpoint(&["users", "sign_out"])?;
        let response = self
            .http
            .delete(url)
            .header(AUTHORIZATION, session.bearer())
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        debug!(%status, "sign out");
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    /// Confirms the backend is reachable and the session is accepted.
    /// Returns the number of order types visible to the session.
    pub fn check(&self, session: &Session) -> Result<usize> {
        let types = self.source(session).list_schemas()?;
        Ok(types.len())
    }

    pub fn source<'a>(&'a self, session: &'a Session) -> ApiSource<'a> {
        ApiSource {
            client: self,
            session,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("api.base_url {} cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Record, schema and task collaborators backed by the REST API, bound to
/// one session.
#[derive(Debug, Clone, Copy)]
pub struct ApiSource<'a> {
    client: &'a Client,
    session: &'a Session,
}

impl ApiSource<'_> {
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, self.session.bearer())
    }

    fn read<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|error| connection_error(self.client.base_url(), error))?;

        let status = response.status();
        debug!(%status, what, "api read");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response.json().with_context(|| format!("decode {what}"))
    }

    fn write(&self, request: RequestBuilder, what: &str) -> Result<Response, SubmitError> {
        let response = self.authorized(request).send().map_err(|error| {
            warn!(%error, what, "api write failed to send");
            SubmitError::Network(format!("cannot reach {} ({error})", self.client.base_url()))
        })?;

        let status = response.status();
        debug!(%status, what, "api write");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(submit_error(status, &body))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SubmitError> {
        self.client
            .endpoint(segments)
            .map_err(|error| SubmitError::Network(format!("{error:#}")))
    }
}

impl RecordSource for ApiSource<'_> {
    fn list(&mut self, criteria: &ListCriteria) -> Result<Vec<Order>> {
        let mut url = self.client.endpoint(&["orders"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(state) = criteria.state {
                query.append_pair("state", state.as_str());
            }
            if let Some(archived) = criteria.archived {
                query.append_pair("archived", if archived { "true" } else { "false" });
            }
            if let Some(search) = criteria.search.as_deref().filter(|q| !q.trim().is_empty()) {
                query.append_pair("q", search.trim());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        let envelope: OrdersEnvelope = self.read(self.client.http.get(url), "order list")?;
        Ok(envelope.orders)
    }

    fn get_by_code(&mut self, code: &str) -> Result<Order> {
        let url = self.client.endpoint(&["orders", code])?;
        let envelope: OrderEnvelope = self
            .read(self.client.http.get(url), "order")
            .with_context(|| format!("load order {code}"))?;
        Ok(envelope.order)
    }

    fn submit(&mut self, draft: &OrderDraft) -> Result<Order, SubmitError> {
        let request = match &draft.code {
            Some(code) => self.client.http.put(self.endpoint(&["orders", code])?).json(&OrderBody {
                order: OrderPayload {
                    order_type_id: None,
                    data: &draft.data,
                },
            }),
            None => self.client.http.post(self.endpoint(&["orders"])?).json(&OrderBody {
                order: OrderPayload {
                    order_type_id: Some(draft.order_type_id),
                    data: &draft.data,
                },
            }),
        };

        let response = self.write(request, "order submit")?;
        let envelope: OrderEnvelope = response
            .json()
            .map_err(|error| SubmitError::Network(format!("unreadable order response ({error})")))?;
        info!(code = %envelope.order.code, "order saved");
        Ok(envelope.order)
    }
}

impl SchemaSource for ApiSource<'_> {
    fn list_schemas(&mut self) -> Result<Vec<OrderType>> {
        let url = self.client.endpoint(&["admin", "order_types"])?;
        let envelope: OrderTypesEnvelope = self.read(self.client.http.get(url), "order types")?;
        Ok(envelope.order_types)
    }
}

impl TaskSource for ApiSource<'_> {
    fn list_tasks(&mut self) -> Result<Vec<Task>> {
        let mut url = self.client.endpoint(&["widget", "tasks"])?;
        url.query_pairs_mut().append_pair("entity_class", "order");
        let envelope: TasksEnvelope = self.read(self.client.http.get(url), "task list")?;
        Ok(envelope.tasks)
    }

    fn task_form(&mut self, task: &Task) -> Result<TaskForm> {
        let mut url = self.client.endpoint(&["widget", "tasks", task.id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("process_key", &task.process_key);
        let envelope: TaskFormEnvelope = self
            .read(self.client.http.get(url), "task form")
            .with_context(|| format!("load form for task {}", task.id))?;
        Ok(TaskForm {
            task: envelope.task,
            fields: envelope.form.fields,
        })
    }

    fn submit_task(&mut self, task: &Task, data: &DataMap) -> Result<(), SubmitError> {
        let url = self.endpoint(&["widget", "tasks", task.id.as_str(), "form"])?;
        let request = self.client.http.put(url).json(&TaskFormBody {
            form_data: data,
            process_key: &task.process_key,
        });
        self.write(request, "task submit")?;
        info!(task = %task.id, "task form submitted");
        Ok(())
    }

    fn claim_task(&mut self, task: &Task) -> Result<()> {
        let url = self.client.endpoint(&["widget", "tasks", task.id.as_str(), "claim"])?;
        let request = self.client.http.post(url).json(&ProcessKeyBody {
            process_key: &task.process_key,
        });
        self.write(request, "task claim")
            .map_err(|error| anyhow!("claim task {}: {error}", task.id))?;
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("api.base_url must not be empty");
    }
    let url = Url::parse(trimmed)
        .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "api.base_url must use http or https, got {:?} -- fix [api].base_url and retry",
            url.scheme()
        );
    }
    if url.cannot_be_a_base() {
        bail!("api.base_url {trimmed:?} cannot take a path");
    }
    Ok(url)
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [api].base_url and that the server is running ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if status == StatusCode::UNAUTHORIZED {
        return anyhow!("session expired -- sign in again");
    }
    match error_message(body) {
        Some(message) => anyhow!("server error ({}): {}", status.as_u16(), message),
        None => anyhow!("server returned {}", status.as_u16()),
    }
}

fn submit_error(status: StatusCode, body: &str) -> SubmitError {
    if status == StatusCode::UNAUTHORIZED {
        return SubmitError::SessionExpired;
    }
    let message = error_message(body);
    if status.is_client_error() {
        return SubmitError::Rejected(
            message.unwrap_or_else(|| format!("request rejected ({})", status.as_u16())),
        );
    }
    SubmitError::Network(match message {
        Some(message) => format!("server error ({}): {}", status.as_u16(), message),
        None => format!("server returned {}", status.as_u16()),
    })
}

/// Pulls a readable message out of `{error}` or `{errors}` envelopes, where
/// `errors` is a list of strings or a map of field to messages.
fn error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(error) = parsed.error.filter(|error| !error.trim().is_empty()) {
            return Some(error);
        }
        let mut messages = Vec::new();
        match parsed.errors {
            Some(Value::Array(items)) => {
                messages.extend(items.iter().filter_map(|item| item.as_str().map(str::to_owned)));
            }
            Some(Value::Object(fields)) => {
                for (field, value) in fields {
                    match value {
                        Value::Array(items) => messages.extend(
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(|text| format!("{field} {text}")),
                        ),
                        Value::String(text) => messages.push(format!("{field} {text}")),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        if !messages.is_empty() {
            return Some(messages.join("; "));
        }
        return None;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return Some(trimmed.to_owned());
    }
    None
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
    orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: Order,
}

#[derive(Debug, Deserialize)]
struct OrderTypesEnvelope {
    order_types: Vec<OrderType>,
}

#[derive(Debug, Deserialize)]
struct TasksEnvelope {
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
struct TaskFormEnvelope {
    task: Task,
    #[serde(default)]
    form: FormEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct FormEnvelope {
    #[serde(default)]
    fields: FieldSet,
}

#[derive(Debug, Serialize)]
struct SignInBody<'a> {
    user: Credentials<'a>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    order: OrderPayload<'a>,
}

#[derive(Debug, Serialize)]
struct OrderPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    order_type_id: Option<OrderTypeId>,
    data: &'a DataMap,
}

#[derive(Debug, Serialize)]
struct TaskFormBody<'a> {
    form_data: &'a DataMap,
    process_key: &'a str,
}

#[derive(Debug, Serialize)]
struct ProcessKeyBody<'a> {
    process_key: &'a str,
}
