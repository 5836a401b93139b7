// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use orderdesk_app::codec::format_timestamp;
use orderdesk_app::{
    Choice, DataMap, FieldKind, FieldSchema, FieldSet, FieldType, ListCriteria, Order,
    OrderDraft, OrderId, OrderState, OrderType, OrderTypeId, RecordSource, SchemaSource,
    SubmitError, Submission, Task, TaskForm, TaskId, TaskSource, User, UserId, UserRole,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const FIRST_NAMES: [&str; 10] = [
    "John", "Jane", "Maria", "Omar", "Lena", "Priya", "Tomas", "Grace", "Kenji", "Ava",
];
const LAST_NAMES: [&str; 10] = [
    "Doe", "Smith", "Garcia", "Haddad", "Novak", "Patel", "Berg", "Okafor", "Sato", "Reed",
];
const CITIES: [&str; 8] = [
    "New York", "Chicago", "Austin", "Denver", "Portland", "Boston", "Atlanta", "Seattle",
];
const PROBLEMS: [&str; 8] = [
    "System login issues",
    "Billing question",
    "Router keeps rebooting",
    "Slow connection in the evening",
    "Invoice shows wrong address",
    "Cannot reset password",
    "Service outage after storm",
    "Upgrade request",
];
const REASONS: [&str; 5] = [
    "Annual vacation",
    "Family event",
    "Medical appointment",
    "Conference travel",
    "Moving house",
];

/// Reference instant the fixtures are dated around.
pub fn fixture_now() -> OffsetDateTime {
    datetime!(2024-01-16 09:00 UTC)
}

fn created() -> OffsetDateTime {
    datetime!(2024-01-01 00:00 UTC)
}

pub fn new_customer_type() -> OrderType {
    order_type(
        1,
        "new_customer",
        "New Customer",
        vec![
            FieldSchema::new("customerName", "Customer Name", FieldKind::String).required(),
            FieldSchema::new("customerPhone", "Customer Phone", FieldKind::String).required(),
            FieldSchema::new("customerEmail", "Customer Email", FieldKind::String),
            FieldSchema::new("customerCity", "Customer City", FieldKind::String).required(),
            FieldSchema::new("installDate", "Install Date", FieldKind::Datetime).required(),
        ],
    )
}

pub fn support_request_type() -> OrderType {
    order_type(
        2,
        "support_request",
        "Support Request",
        vec![
            FieldSchema::new("problemDescription", "Problem Description", FieldKind::String)
                .required(),
            FieldSchema::new("contractNumber", "Contract Number", FieldKind::Number),
            FieldSchema::new("callBack", "Callback Required", FieldKind::Boolean),
        ],
    )
}

pub fn vacation_request_type() -> OrderType {
    order_type(
        3,
        "vacation_request",
        "Vacation Request",
        vec![
            FieldSchema::new("employee", "Employee", FieldKind::String).required(),
            FieldSchema::new("startDate", "Start Date", FieldKind::Datetime).required(),
            FieldSchema::new("endDate", "End Date", FieldKind::Datetime).required(),
            FieldSchema::new("reason", "Reason", FieldKind::String),
        ],
    )
}

/// Exercises every field kind, nested groups included.
pub fn site_survey_type() -> OrderType {
    order_type(
        4,
        "site_survey",
        "Site Survey",
        vec![
            FieldSchema::new(
                "intro",
                "",
                FieldKind::Static {
                    html: "<p>Record what the technician found on site.</p>".to_owned(),
                },
            ),
            FieldSchema::new(
                "surveyType",
                "Survey Type",
                FieldKind::select(
                    vec![
                        Choice::new("residential", "Residential"),
                        Choice::new("commercial", "Commercial"),
                    ],
                    false,
                ),
            )
            .required(),
            FieldSchema::new(
                "contact",
                "On-site Contact",
                FieldKind::group(vec![
                    FieldSchema::new("contactName", "Name", FieldKind::String).required(),
                    FieldSchema::new("contactPhone", "Phone", FieldKind::String),
                    FieldSchema::new(
                        "preferredChannel",
                        "Preferred Channel",
                        FieldKind::select(
                            vec![Choice::new("sms", "SMS"), Choice::new("call", "Call")],
                            true,
                        ),
                    ),
                ]),
            ),
            FieldSchema::new("visitAt", "Visit At", FieldKind::Datetime),
            FieldSchema::new("cableMeters", "Cable (m)", FieldKind::Number),
            FieldSchema::new("ladderNeeded", "Ladder Needed", FieldKind::Boolean),
            FieldSchema::new("equipment", "Equipment", FieldKind::Json),
            FieldSchema::new("notes", "Notes", FieldKind::text())
                .with_description("Anything the install crew should know"),
        ],
    )
}

pub fn order_types() -> Vec<OrderType> {
    vec![
        new_customer_type(),
        support_request_type(),
        vacation_request_type(),
        site_survey_type(),
    ]
}

fn order_type(id: i64, code: &str, name: &str, fields: Vec<FieldSchema>) -> OrderType {
    OrderType {
        id: OrderTypeId::new(id),
        code: code.to_owned(),
        name: name.to_owned(),
        active: true,
        fields: FieldSet::new(fields),
        print_form_code: None,
        created_at: created(),
        updated_at: created(),
    }
}

pub fn demo_user() -> User {
    User {
        id: UserId::new(1),
        email: "john@example.com".to_owned(),
        name: "John".to_owned(),
        last_name: "Doe".to_owned(),
        middle_name: None,
        company: "Example Corp".to_owned(),
        department: "Sales".to_owned(),
        role: UserRole::User,
        blocked: false,
        external: false,
        api_token: None,
    }
}

pub fn orders() -> Vec<Order> {
    let mut new_customer = order(
        1,
        "ORD-1234",
        OrderState::InProgress,
        new_customer_type(),
        json!({
            "customerName": "John Doe",
            "customerPhone": "+1234567890",
            "customerEmail": "john@example.com",
            "customerCity": "New York",
            "installDate": "2024-02-01T10:00:00Z"
        }),
        datetime!(2024-01-15 10:30 UTC),
    );
    new_customer.ext_code = Some("EXT-001".to_owned());
    new_customer.estimated_exec_date = Some(datetime!(2024-02-01 10:00 UTC));
    new_customer.user = Some(demo_user());

    let support = order(
        2,
        "ORD-1235",
        OrderState::ToExecute,
        support_request_type(),
        json!({
            "problemDescription": "System login issues",
            "contractNumber": 12345,
            "callBack": true
        }),
        datetime!(2024-01-14 14:20 UTC),
    );

    let mut vacation = order(
        3,
        "ORD-1236",
        OrderState::Done,
        vacation_request_type(),
        json!({
            "employee": "Jane Smith",
            "startDate": "2024-02-15T00:00:00Z",
            "endDate": "2024-02-20T00:00:00Z",
            "reason": "Annual vacation"
        }),
        datetime!(2024-01-13 09:15 UTC),
    );
    vacation.done_at = Some(datetime!(2024-01-13 16:30 UTC));

    vec![new_customer, support, vacation]
}

fn order(
    id: i64,
    code: &str,
    state: OrderState,
    order_type: OrderType,
    data: Value,
    at: OffsetDateTime,
) -> Order {
    Order {
        id: OrderId::new(id),
        code: code.to_owned(),
        ext_code: None,
        bp_id: None,
        bp_state: None,
        state,
        archived: false,
        done_at: None,
        estimated_exec_date: None,
        data: into_map(data),
        created_at: at,
        updated_at: at,
        order_type,
        user: None,
    }
}

pub fn tasks() -> Vec<Task> {
    vec![
        Task {
            id: TaskId::new("111111"),
            name: "Process New Customer Application".to_owned(),
            assignee: Some("demo".to_owned()),
            created: datetime!(2024-01-15 10:30 UTC),
            due: Some(datetime!(2024-01-20 17:00 UTC)),
            priority: 50,
            process_name: "New Customer Process".to_owned(),
            process_key: "new_customer".to_owned(),
            entity_code: "ORD-1234".to_owned(),
            entity_url: "/orders/ORD-1234?task_id=111111".to_owned(),
            description: Some("Review and approve new customer application".to_owned()),
        },
        Task {
            id: TaskId::new("111112"),
            name: "Handle Support Request".to_owned(),
            assignee: Some("demo".to_owned()),
            created: datetime!(2024-01-14 14:20 UTC),
            due: Some(datetime!(2024-01-16 12:00 UTC)),
            priority: 75,
            process_name: "Support Process".to_owned(),
            process_key: "support_request".to_owned(),
            entity_code: "ORD-1235".to_owned(),
            entity_url: "/orders/ORD-1235?task_id=111112".to_owned(),
            description: Some("Investigate and resolve customer issue".to_owned()),
        },
    ]
}

/// Completion form for a task, keyed by the task's process.
pub fn task_fields(process_key: &str) -> FieldSet {
    match process_key {
        "new_customer" => FieldSet::new(vec![
            FieldSchema::new("approved", "Application Approved", FieldKind::Boolean).required(),
            FieldSchema::new("installSlot", "Install Slot", FieldKind::Datetime).required(),
            FieldSchema::new("comment", "Comment", FieldKind::text()),
        ]),
        "support_request" => FieldSet::new(vec![
            FieldSchema::new(
                "resolution",
                "Resolution",
                FieldKind::select(
                    vec![
                        Choice::new("fixed", "Fixed"),
                        Choice::new("escalated", "Escalated"),
                        Choice::new("wont_fix", "Won't Fix"),
                    ],
                    false,
                ),
            )
            .required(),
            FieldSchema::new("timeSpent", "Time Spent (min)", FieldKind::Number),
            FieldSchema::new("notes", "Notes", FieldKind::text()),
        ]),
        _ => FieldSet::new(vec![FieldSchema::new(
            "comment",
            "Comment",
            FieldKind::text(),
        )]),
    }
}

pub fn into_map(value: Value) -> DataMap {
    match value {
        Value::Object(map) => map,
        _ => DataMap::new(),
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of plausible order data for any field schema.
#[derive(Debug, Clone)]
pub struct OrderFaker {
    rng: DeterministicRng,
}

impl OrderFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    /// Values for every leaf of `fields`; required leaves are never empty.
    pub fn data_for(&mut self, fields: &FieldSet, around: OffsetDateTime) -> DataMap {
        let mut data = DataMap::new();
        for field in fields.leaves() {
            if !field.required && self.rng.int_n(4) == 0 {
                continue;
            }
            data.insert(field.name.clone(), self.value_for(field, around));
        }
        data
    }

    pub fn order(&mut self, id: i64, order_type: &OrderType, around: OffsetDateTime) -> Order {
        let state = OrderState::ALL[self.rng.int_n(OrderState::ALL.len())];
        let at = around - Duration::hours(self.rng.int_n(24 * 30) as i64);
        let mut order = order(
            id,
            &format!("ORD-{}", 2000 + id),
            state,
            order_type.clone(),
            Value::Null,
            at,
        );
        order.data = self.data_for(&order_type.fields, around);
        order.archived = state == OrderState::Done && self.rng.int_n(3) == 0;
        if state == OrderState::Done {
            order.done_at = Some(at + Duration::hours(self.rng.int_n(48) as i64 + 1));
        }
        order
    }

    fn value_for(&mut self, field: &FieldSchema, around: OffsetDateTime) -> Value {
        let name = field.name.to_ascii_lowercase();
        match field.field_type() {
            FieldType::Boolean => Value::Bool(self.rng.bool()),
            FieldType::Number => json!(self.rng.int_n(90_000) + 10_000),
            FieldType::Datetime => {
                let offset = Duration::hours(self.rng.int_n(24 * 60) as i64);
                Value::String(format_timestamp(around + offset))
            }
            FieldType::Select => match field.choices() {
                [] => Value::String(String::new()),
                choices => Value::String(choices[self.rng.int_n(choices.len())].value.clone()),
            },
            FieldType::Json => Value::String(format!(
                "{{\"units\": {}}}",
                self.rng.int_n(5) + 1
            )),
            FieldType::Text => Value::String(self.pick(&PROBLEMS).to_owned()),
            FieldType::String if name.contains("phone") => {
                Value::String(format!("+1555{:07}", self.rng.int_n(10_000_000)))
            }
            FieldType::String if name.contains("email") => {
                let first = self.pick(&FIRST_NAMES).to_ascii_lowercase();
                Value::String(format!("{first}@example.com"))
            }
            FieldType::String if name.contains("city") => {
                Value::String(self.pick(&CITIES).to_owned())
            }
            FieldType::String if name.contains("problem") => {
                Value::String(self.pick(&PROBLEMS).to_owned())
            }
            FieldType::String if name.contains("reason") => {
                Value::String(self.pick(&REASONS).to_owned())
            }
            FieldType::String => {
                let first = self.pick(&FIRST_NAMES);
                let last = self.pick(&LAST_NAMES);
                Value::String(format!("{first} {last}"))
            }
            FieldType::Static | FieldType::Group => Value::Null,
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// In-memory record, schema and task collaborator with scriptable failures
/// and call counters.
#[derive(Debug, Clone)]
pub struct MemorySource {
    pub order_types: Vec<OrderType>,
    pub orders: Vec<Order>,
    pub tasks: Vec<Task>,
    pub submissions: Vec<Submission>,
    pub claimed: Vec<TaskId>,
    pub submit_calls: usize,
    pub list_calls: usize,
    task_forms: BTreeMap<String, FieldSet>,
    fail_next_submit: Option<SubmitError>,
    now: OffsetDateTime,
}

impl MemorySource {
    pub fn new(order_types: Vec<OrderType>, orders: Vec<Order>, tasks: Vec<Task>) -> Self {
        Self {
            order_types,
            orders,
            tasks,
            submissions: Vec::new(),
            claimed: Vec::new(),
            submit_calls: 0,
            list_calls: 0,
            task_forms: BTreeMap::new(),
            fail_next_submit: None,
            now: fixture_now(),
        }
    }

    /// The fixture order types, orders and tasks.
    pub fn fixtures() -> Self {
        Self::new(order_types(), orders(), tasks())
    }

    /// Fixtures plus `extra` generated orders spread over the order types.
    pub fn demo(seed: u64, extra: usize) -> Self {
        let mut source = Self::fixtures();
        let mut faker = OrderFaker::new(seed);
        let types = source.order_types.clone();
        for index in 0..extra {
            let order_type = &types[index % types.len()];
            let id = (source.orders.len() + 1) as i64;
            source.orders.push(faker.order(id, order_type, source.now));
        }
        source
    }

    pub fn with_clock(mut self, now: OffsetDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn set_task_form(&mut self, process_key: &str, fields: FieldSet) {
        self.task_forms.insert(process_key.to_owned(), fields);
    }

    /// The next order or task submit fails with `error` instead of saving.
    pub fn fail_next_submit(&mut self, error: SubmitError) {
        self.fail_next_submit = Some(error);
    }

    fn take_failure(&mut self) -> Result<(), SubmitError> {
        self.submit_calls += 1;
        match self.fail_next_submit.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_code(&self) -> String {
        let mut number = 1000 + self.orders.len() + 1;
        while self.orders.iter().any(|order| order.code == format!("ORD-{number}")) {
            number += 1;
        }
        format!("ORD-{number}")
    }
}

impl RecordSource for MemorySource {
    fn list(&mut self, criteria: &ListCriteria) -> Result<Vec<Order>> {
        self.list_calls += 1;
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|order| criteria.matches(order))
            .cloned()
            .collect();
        orders.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(orders)
    }

    fn get_by_code(&mut self, code: &str) -> Result<Order> {
        self.orders
            .iter()
            .find(|order| order.code == code)
            .cloned()
            .ok_or_else(|| anyhow!("order {code} not found"))
    }

    fn submit(&mut self, draft: &OrderDraft) -> Result<Order, SubmitError> {
        self.take_failure()?;
        let now = self.now;

        if let Some(code) = &draft.code {
            let order = self
                .orders
                .iter_mut()
                .find(|order| &order.code == code)
                .ok_or_else(|| SubmitError::Rejected(format!("order {code} not found")))?;
            order.data = draft.data.clone();
            order.updated_at = now;
            return Ok(order.clone());
        }

        let order_type = self
            .order_types
            .iter()
            .find(|order_type| order_type.id == draft.order_type_id)
            .cloned()
            .ok_or_else(|| {
                SubmitError::Rejected(format!("order type {} not found", draft.order_type_id))
            })?;
        if !order_type.active {
            return Err(SubmitError::Rejected(format!(
                "order type {} is inactive",
                order_type.name
            )));
        }

        let id = self
            .orders
            .iter()
            .map(|order| order.id.get())
            .max()
            .unwrap_or(0)
            + 1;
        let mut created = order(
            id,
            &self.next_code(),
            OrderState::ToExecute,
            order_type,
            Value::Null,
            now,
        );
        created.data = draft.data.clone();
        self.orders.insert(0, created.clone());
        Ok(created)
    }
}

impl SchemaSource for MemorySource {
    fn list_schemas(&mut self) -> Result<Vec<OrderType>> {
        Ok(self.order_types.clone())
    }
}

impl TaskSource for MemorySource {
    fn list_tasks(&mut self) -> Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    fn task_form(&mut self, task: &Task) -> Result<TaskForm> {
        let fields = self
            .task_forms
            .get(&task.process_key)
            .cloned()
            .unwrap_or_else(|| task_fields(&task.process_key));
        Ok(TaskForm {
            task: task.clone(),
            fields,
        })
    }

    fn submit_task(&mut self, task: &Task, data: &DataMap) -> Result<(), SubmitError> {
        self.take_failure()?;
        let index = self
            .tasks
            .iter()
            .position(|candidate| candidate.id == task.id)
            .ok_or_else(|| SubmitError::Rejected(format!("task {} is no longer open", task.id)))?;
        self.tasks.remove(index);
        self.submissions.push(Submission {
            code: task.id.to_string(),
            data: data.clone(),
        });
        Ok(())
    }

    fn claim_task(&mut self, task: &Task) -> Result<()> {
        let open = self
            .tasks
            .iter_mut()
            .find(|candidate| candidate.id == task.id)
            .ok_or_else(|| anyhow!("task {} not found", task.id))?;
        open.assignee = Some("me".to_owned());
        self.claimed.push(task.id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        MemorySource, OrderFaker, fixture_now, order_types, orders, site_survey_type, tasks,
    };
    use orderdesk_app::{
        DataMap, FieldType, ListCriteria, OrderDraft, OrderState, OrderTypeId, RecordSource,
        SubmitError, TaskSource,
    };
    use serde_json::json;

    #[test]
    fn fixtures_are_consistent_with_their_schemas() {
        for order in orders() {
            order.order_type.fields.validate().expect("fixture schema valid");
            for field in order.order_type.fields.leaves() {
                if field.required {
                    assert!(
                        order.data.contains_key(&field.name),
                        "{} missing {}",
                        order.code,
                        field.name
                    );
                }
            }
        }
        for order_type in order_types() {
            order_type.fields.validate().expect("fixture schema valid");
        }
        let codes: Vec<String> = tasks().into_iter().map(|task| task.entity_code).collect();
        assert_eq!(codes, vec!["ORD-1234", "ORD-1235"]);
    }

    #[test]
    fn survey_type_covers_every_field_kind() {
        let survey = site_survey_type();
        let mut seen = Vec::new();
        survey.fields.walk(&mut |field| seen.push(field.field_type()));
        for field_type in FieldType::ALL {
            assert!(seen.contains(&field_type), "missing {}", field_type.as_str());
        }
    }

    #[test]
    fn faker_is_deterministic_and_fills_required_fields() {
        let survey = site_survey_type();
        let mut left = OrderFaker::new(42);
        let mut right = OrderFaker::new(42);
        let a = left.data_for(&survey.fields, fixture_now());
        let b = right.data_for(&survey.fields, fixture_now());
        assert_eq!(a, b);
        for name in ["surveyType", "contactName"] {
            assert!(a.contains_key(name), "required {name} generated");
        }
    }

    #[test]
    fn demo_adds_generated_orders() {
        let source = MemorySource::demo(7, 12);
        assert_eq!(source.orders.len(), 15);
        assert!(source.orders[3..].iter().all(|order| order.code.starts_with("ORD-2")));
    }

    #[test]
    fn list_filters_and_sorts_newest_first() -> anyhow::Result<()> {
        let mut source = MemorySource::fixtures();
        let all = source.list(&ListCriteria::default())?;
        let codes: Vec<&str> = all.iter().map(|order| order.code.as_str()).collect();
        assert_eq!(codes, vec!["ORD-1234", "ORD-1235", "ORD-1236"]);

        let done = source.list(&ListCriteria {
            state: Some(OrderState::Done),
            ..ListCriteria::default()
        })?;
        assert_eq!(done.len(), 1);
        assert_eq!(source.list_calls, 2);
        Ok(())
    }

    #[test]
    fn create_and_update_orders() {
        let mut source = MemorySource::fixtures();
        let mut data = DataMap::new();
        data.insert("problemDescription".to_owned(), json!("Cannot print"));

        let created = source
            .submit(&OrderDraft::create(OrderTypeId::new(2), data))
            .expect("create succeeds");
        assert_eq!(created.code, "ORD-1004");
        assert_eq!(created.state, OrderState::ToExecute);
        assert_eq!(source.orders[0].code, "ORD-1004");

        let mut changed = created.data.clone();
        changed.insert("callBack".to_owned(), json!(true));
        let updated = source
            .submit(&OrderDraft::update(&created, changed))
            .expect("update succeeds");
        assert_eq!(updated.data.get("callBack"), Some(&json!(true)));
        assert_eq!(source.submit_calls, 2);

        let unknown = source.submit(&OrderDraft::create(OrderTypeId::new(99), DataMap::new()));
        assert!(matches!(unknown, Err(SubmitError::Rejected(_))));
    }

    #[test]
    fn scripted_failure_hits_only_the_next_submit() {
        let mut source = MemorySource::fixtures();
        source.fail_next_submit(SubmitError::Network("offline".to_owned()));
        let draft = OrderDraft::create(OrderTypeId::new(1), DataMap::new());

        assert_eq!(
            source.submit(&draft),
            Err(SubmitError::Network("offline".to_owned()))
        );
        assert!(source.submit(&draft).is_ok());
        assert_eq!(source.submit_calls, 2);
    }

    #[test]
    fn task_submit_records_submission_and_closes_task() -> anyhow::Result<()> {
        let mut source = MemorySource::fixtures();
        let task = source.list_tasks()?.remove(0);
        let form = source.task_form(&task)?;
        assert!(form.fields.leaf("approved").is_some());

        source.claim_task(&task)?;
        assert_eq!(source.claimed, vec![task.id.clone()]);

        let mut data = DataMap::new();
        data.insert("approved".to_owned(), json!(true));
        source
            .submit_task(&task, &data)
            .map_err(|error| anyhow::anyhow!("{error}"))?;
        assert_eq!(source.tasks.len(), 1);
        assert_eq!(source.submissions[0].code, "111111");

        let again = source.submit_task(&task, &data);
        assert!(matches!(again, Err(SubmitError::Rejected(_))));
        Ok(())
    }
}
