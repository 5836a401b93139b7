// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use orderdesk_app::codec::yes_no;
use orderdesk_app::render::{leaf_controls, render_fields};
use orderdesk_app::{
    AppCommand, AppEvent, AppMode, AppState, Codec, Control, DataMap, DueStatus, EditValue,
    FieldErrors, FieldSchema, FilterEngine, FormEngine, Input, ListCriteria, Mode, Order,
    OrderDraft, OrderType, OrderTypeId, PLACEHOLDER, RecordSource, RenderContext, SchemaSource,
    SelectOption, SubmitError, SubmitOutcome, TabKind, Task, TaskForm, TaskId, TaskSource, Widget,
    find_task, relative_time,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::collections::BTreeMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_TTL: Duration = Duration::from_secs(4);
const CURSOR_MARK: &str = "›";
const RANGE_ARROW: &str = "→";
const DATETIME_HINT: &str = "YYYY-MM-DDTHH:MM";

/// Everything the shell needs from the backend. Submits report the
/// collaborator's own failure taxonomy so forms can surface it verbatim.
pub trait AppRuntime {
    fn load_order_types(&mut self) -> Result<Vec<OrderType>>;
    fn load_orders(&mut self, criteria: &ListCriteria) -> Result<Vec<Order>>;
    fn load_order(&mut self, code: &str) -> Result<Order>;
    fn load_tasks(&mut self) -> Result<Vec<Task>>;
    fn load_task_form(&mut self, task: &Task) -> Result<TaskForm>;
    fn submit_order(&mut self, draft: &OrderDraft) -> Result<Order, SubmitError>;
    fn submit_task(&mut self, task: &Task, data: &DataMap) -> Result<(), SubmitError>;
    fn claim_task(&mut self, task: &Task) -> Result<()>;

    fn codec(&self) -> Codec {
        Codec::UTC
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Runs the shell against any record, schema and task collaborator.
#[derive(Debug)]
pub struct SourceRuntime<S> {
    source: S,
    codec: Codec,
    clock: Option<OffsetDateTime>,
}

impl<S> SourceRuntime<S> {
    pub fn new(source: S, codec: Codec) -> Self {
        Self {
            source,
            codec,
            clock: None,
        }
    }

    /// Pins "now" for due dates and relative ages.
    pub fn with_clock(mut self, now: OffsetDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S> AppRuntime for SourceRuntime<S>
where
    S: RecordSource + SchemaSource + TaskSource,
{
    fn load_order_types(&mut self) -> Result<Vec<OrderType>> {
        self.source.list_schemas()
    }

    fn load_orders(&mut self, criteria: &ListCriteria) -> Result<Vec<Order>> {
        self.source.list(criteria)
    }

    fn load_order(&mut self, code: &str) -> Result<Order> {
        self.source.get_by_code(code)
    }

    fn load_tasks(&mut self) -> Result<Vec<Task>> {
        self.source.list_tasks()
    }

    fn load_task_form(&mut self, task: &Task) -> Result<TaskForm> {
        self.source.task_form(task)
    }

    fn submit_order(&mut self, draft: &OrderDraft) -> Result<Order, SubmitError> {
        self.source.submit(draft)
    }

    fn submit_task(&mut self, task: &Task, data: &DataMap) -> Result<(), SubmitError> {
        self.source.submit_task(task, data)
    }

    fn claim_task(&mut self, task: &Task) -> Result<()> {
        self.source.claim_task(task)
    }

    fn codec(&self) -> Codec {
        self.codec
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.unwrap_or_else(OffsetDateTime::now_utc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotPart {
    Value,
    From,
    To,
}

/// One focusable input. Date ranges contribute two.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    name: String,
    part: SlotPart,
}

/// Focused slot plus the raw text typed into it. The draft lets partial
/// dates and numbers survive keystrokes the codec would reject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FieldFocus {
    index: usize,
    draft: Option<String>,
}

impl FieldFocus {
    fn at(index: usize) -> Self {
        Self { index, draft: None }
    }

    fn step(&mut self, delta: isize, slots: usize) {
        self.draft = None;
        if slots == 0 {
            self.index = 0;
            return;
        }
        self.index = (self.index as isize + delta).rem_euclid(slots as isize) as usize;
    }
}

#[derive(Debug, Clone)]
enum FormTarget {
    NewOrder(OrderTypeId),
    EditOrder(Box<Order>),
    Task(TaskId),
}

#[derive(Debug, Clone)]
struct FormOverlay {
    title: String,
    target: FormTarget,
    engine: FormEngine<'static>,
    focus: FieldFocus,
    /// Values handed out by `begin_submit` and not yet sent.
    pending: Option<DataMap>,
}

impl FormOverlay {
    fn new(title: String, target: FormTarget, engine: FormEngine<'static>) -> Self {
        Self {
            title,
            target,
            engine,
            focus: FieldFocus::default(),
            pending: None,
        }
    }

    fn busy(&self) -> bool {
        self.pending.is_some() || self.engine.is_submitting()
    }
}

#[derive(Debug, Clone)]
struct FilterPanel {
    engine: FilterEngine<'static>,
    order_type_id: OrderTypeId,
    type_name: String,
    focus: FieldFocus,
    picker: Option<usize>,
}

impl FilterPanel {
    fn new(order_type: &OrderType, codec: Codec) -> Self {
        Self {
            engine: FilterEngine::new(order_type.fields.clone(), codec),
            order_type_id: order_type.id,
            type_name: order_type.name.clone(),
            focus: FieldFocus::default(),
            picker: None,
        }
    }

    fn rebind(&mut self, order_type: &OrderType) {
        self.engine.rebind(order_type.fields.clone());
        self.order_type_id = order_type.id;
        self.type_name = order_type.name.clone();
        self.focus = FieldFocus::default();
        self.picker = None;
        debug!(order_type = %order_type.code, "filter panel rebound");
    }
}

#[derive(Debug, Clone)]
enum DetailView {
    Order(Box<Order>),
    OrderType(Box<OrderType>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableCursor {
    orders: usize,
    tasks: usize,
    order_types: usize,
}

impl TableCursor {
    fn get_mut(&mut self, tab: TabKind) -> &mut usize {
        match tab {
            TabKind::Orders => &mut self.orders,
            TabKind::Tasks => &mut self.tasks,
            TabKind::OrderTypes => &mut self.order_types,
        }
    }
}

#[derive(Debug, Clone)]
struct ViewData {
    codec: Codec,
    now: OffsetDateTime,
    order_types: Vec<OrderType>,
    orders: Vec<Order>,
    tasks: Vec<Task>,
    cursor: TableCursor,
    filters: Option<FilterPanel>,
    detail: Option<DetailView>,
    form: Option<FormOverlay>,
    status_token: u64,
}

impl ViewData {
    fn new(codec: Codec, now: OffsetDateTime) -> Self {
        Self {
            codec,
            now,
            order_types: Vec::new(),
            orders: Vec::new(),
            tasks: Vec::new(),
            cursor: TableCursor::default(),
            filters: None,
            detail: None,
            form: None,
            status_token: 0,
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(runtime.codec(), runtime.now());
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view_data(state, runtime, &mut view_data) {
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error:#}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        // The frame above shows the form as submitting; send it now.
        if view_data.form.as_ref().is_some_and(|form| form.pending.is_some()) {
            finish_pending_submit(state, runtime, &mut view_data, &internal_tx);
            continue;
        }

        match next_key_event() {
            Ok(Some(key)) => {
                if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn next_key_event() -> Result<Option<KeyEvent>> {
    if !event::poll(POLL_INTERVAL).context("poll event")? {
        return Ok(None);
    }
    match event::read().context("read event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
    }
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_TTL);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

/// Dispatches a command; any status it sets expires like `emit_status`.
fn dispatch_command(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) -> Vec<AppEvent> {
    let events = state.dispatch(command);
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
    events
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    dispatch_command(
        state,
        view_data,
        internal_tx,
        AppCommand::SetStatus(message.into()),
    );
}

fn list_criteria(state: &AppState) -> ListCriteria {
    if state.show_archived {
        ListCriteria::default()
    } else {
        ListCriteria::active()
    }
}

fn refresh_view_data<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    view_data.now = runtime.now();
    view_data.order_types = runtime.load_order_types().context("load order types")?;
    view_data.orders = runtime
        .load_orders(&list_criteria(state))
        .context("load orders")?;
    view_data.tasks = runtime.load_tasks().context("load tasks")?;
    clamp_cursors(view_data);
    debug!(
        orders = view_data.orders.len(),
        tasks = view_data.tasks.len(),
        order_types = view_data.order_types.len(),
        "view data refreshed"
    );
    Ok(())
}

fn reload<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    match refresh_view_data(state, runtime, view_data) {
        Ok(()) => emit_status(state, view_data, internal_tx, message),
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("reload failed: {error:#}"),
        ),
    }
}

fn visible_orders(view_data: &ViewData) -> Vec<&Order> {
    match &view_data.filters {
        Some(panel) => panel.engine.filter(&view_data.orders),
        None => view_data.orders.iter().collect(),
    }
}

fn selected_order(view_data: &ViewData) -> Option<&Order> {
    visible_orders(view_data)
        .get(view_data.cursor.orders)
        .copied()
}

fn selected_task(view_data: &ViewData) -> Option<&Task> {
    view_data.tasks.get(view_data.cursor.tasks)
}

fn row_count(view_data: &ViewData, tab: TabKind) -> usize {
    match tab {
        TabKind::Orders => visible_orders(view_data).len(),
        TabKind::Tasks => view_data.tasks.len(),
        TabKind::OrderTypes => view_data.order_types.len(),
    }
}

fn clamp_cursors(view_data: &mut ViewData) {
    for tab in TabKind::ALL {
        let last = row_count(view_data, tab).saturating_sub(1);
        let cursor = view_data.cursor.get_mut(tab);
        *cursor = (*cursor).min(last);
    }
}

fn move_cursor(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let len = row_count(view_data, state.active_tab);
    let cursor = view_data.cursor.get_mut(state.active_tab);
    if len == 0 {
        *cursor = 0;
        return;
    }
    *cursor = (*cursor as isize + delta).clamp(0, len as isize - 1) as usize;
}

/// The live copy of an order's type when the schema list has one.
fn current_type(view_data: &ViewData, order: &Order) -> OrderType {
    view_data
        .order_types
        .iter()
        .find(|order_type| order_type.id == order.order_type.id)
        .cloned()
        .unwrap_or_else(|| order.order_type.clone())
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.form.is_some() {
        handle_form_key(state, view_data, internal_tx, key);
        return false;
    }

    match state.mode {
        AppMode::Filter => {
            handle_filter_key(state, view_data, internal_tx, key);
            return false;
        }
        AppMode::Detail => {
            handle_detail_key(state, view_data, internal_tx, key);
            return false;
        }
        AppMode::Form => {
            state.dispatch(AppCommand::ExitToNav);
        }
        AppMode::Nav => {}
    }

    handle_nav_key(state, runtime, view_data, internal_tx, key)
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Tab, _) => {
            state.dispatch(AppCommand::NextTab);
        }
        (KeyCode::BackTab, _) => {
            state.dispatch(AppCommand::PrevTab);
        }
        (KeyCode::Down | KeyCode::Char('j'), _) => move_cursor(state, view_data, 1),
        (KeyCode::Up | KeyCode::Char('k'), _) => move_cursor(state, view_data, -1),
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            reload(state, runtime, view_data, internal_tx, "reloaded");
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            dispatch_command(state, view_data, internal_tx, AppCommand::ToggleArchived);
            if let Err(error) = refresh_view_data(state, runtime, view_data) {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("reload failed: {error:#}"),
                );
            }
        }
        (KeyCode::Char('f'), KeyModifiers::NONE) => open_filters(state, view_data, internal_tx),
        (KeyCode::Char('F'), _) => {
            if view_data.filters.take().is_some() {
                clamp_cursors(view_data);
                emit_status(state, view_data, internal_tx, "filters cleared");
            }
        }
        (KeyCode::Enter, _) => match state.active_tab {
            TabKind::Orders => open_order_detail(state, runtime, view_data, internal_tx),
            TabKind::Tasks => open_task_form(state, runtime, view_data, internal_tx),
            TabKind::OrderTypes => open_type_detail(state, view_data, internal_tx),
        },
        (KeyCode::Char('e'), KeyModifiers::NONE) => {
            if state.active_tab != TabKind::Orders {
                emit_status(state, view_data, internal_tx, "only orders can be edited");
                return false;
            }
            match selected_order(view_data).cloned() {
                Some(order) => open_edit_form(state, view_data, &order),
                None => emit_status(state, view_data, internal_tx, "no order selected"),
            }
        }
        (KeyCode::Char('n'), KeyModifiers::NONE) => {
            let order_type = match state.active_tab {
                TabKind::Orders => selected_order(view_data)
                    .map(|order| current_type(view_data, order))
                    .or_else(|| {
                        view_data
                            .order_types
                            .iter()
                            .find(|order_type| order_type.active)
                            .cloned()
                    }),
                TabKind::OrderTypes => view_data
                    .order_types
                    .get(view_data.cursor.order_types)
                    .cloned(),
                TabKind::Tasks => None,
            };
            match order_type {
                Some(order_type) => open_new_form(state, view_data, internal_tx, &order_type),
                None => emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "pick an order type first -- switch to orders or order types",
                ),
            }
        }
        (KeyCode::Char('c'), KeyModifiers::NONE) if state.active_tab == TabKind::Tasks => {
            claim_selected_task(state, runtime, view_data, internal_tx);
        }
        _ => {}
    }
    false
}

fn open_order_detail<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(cached) = selected_order(view_data).cloned() else {
        emit_status(state, view_data, internal_tx, "no order selected");
        return;
    };
    let order = match runtime.load_order(&cached.code) {
        Ok(order) => order,
        Err(error) => {
            warn!(code = %cached.code, %error, "order reload failed; showing listed copy");
            cached
        }
    };
    view_data.detail = Some(DetailView::Order(Box::new(order)));
    state.dispatch(AppCommand::OpenDetail);
}

fn open_type_detail(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match view_data
        .order_types
        .get(view_data.cursor.order_types)
        .cloned()
    {
        Some(order_type) => {
            view_data.detail = Some(DetailView::OrderType(Box::new(order_type)));
            state.dispatch(AppCommand::OpenDetail);
        }
        None => emit_status(state, view_data, internal_tx, "no order types loaded"),
    }
}

fn handle_detail_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            view_data.detail = None;
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Char('e') => {
            if let Some(DetailView::Order(order)) = view_data.detail.take() {
                open_edit_form(state, view_data, &order);
            }
        }
        KeyCode::Char('n') => {
            if let Some(DetailView::OrderType(order_type)) = &view_data.detail {
                let order_type = order_type.as_ref().clone();
                open_new_form(state, view_data, internal_tx, &order_type);
            }
        }
        _ => {}
    }
}

fn open_edit_form(state: &mut AppState, view_data: &mut ViewData, order: &Order) {
    let engine = FormEngine::new(order.order_type.fields.clone(), &order.data, view_data.codec);
    view_data.detail = None;
    view_data.form = Some(FormOverlay::new(
        format!("edit {}", order.code),
        FormTarget::EditOrder(Box::new(order.clone())),
        engine,
    ));
    state.dispatch(AppCommand::OpenForm);
    info!(code = %order.code, "edit form opened");
}

fn open_new_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    order_type: &OrderType,
) {
    if !order_type.active {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("order type {} is inactive", order_type.name),
        );
        return;
    }
    let engine = FormEngine::blank(order_type.fields.clone(), view_data.codec);
    view_data.detail = None;
    view_data.form = Some(FormOverlay::new(
        format!("new {} order", order_type.name),
        FormTarget::NewOrder(order_type.id),
        engine,
    ));
    state.dispatch(AppCommand::OpenForm);
    info!(order_type = %order_type.code, "new order form opened");
}

fn open_task_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(task) = selected_task(view_data).cloned() else {
        emit_status(state, view_data, internal_tx, "inbox is empty");
        return;
    };
    match runtime.load_task_form(&task) {
        Ok(TaskForm { task, fields }) => {
            let engine = FormEngine::blank(fields, view_data.codec);
            view_data.form = Some(FormOverlay::new(
                format!("{} · {}", task.name, task.entity_code),
                FormTarget::Task(task.id.clone()),
                engine,
            ));
            state.dispatch(AppCommand::OpenForm);
            info!(task = %task.id, "task form opened");
        }
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("task form failed: {error:#}"),
        ),
    }
}

fn claim_selected_task<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(task) = selected_task(view_data).cloned() else {
        emit_status(state, view_data, internal_tx, "inbox is empty");
        return;
    };
    match runtime.claim_task(&task) {
        Ok(()) => reload(
            state,
            runtime,
            view_data,
            internal_tx,
            format!("claimed {}", task.name),
        ),
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("claim failed: {error:#}"),
        ),
    }
}

/// Interactive inputs in focus order.
fn control_slots(controls: &[Control]) -> Vec<Slot> {
    leaf_controls(controls)
        .into_iter()
        .filter(|control| control.is_interactive())
        .flat_map(|control| {
            let parts: &[SlotPart] = match &control.widget {
                Widget::DateTimeRange { .. } => &[SlotPart::From, SlotPart::To],
                Widget::Text { .. } => &[],
                _ => &[SlotPart::Value],
            };
            parts.iter().map(move |part| Slot {
                name: control.name.clone(),
                part: *part,
            })
        })
        .collect()
}

fn slot_control<'c>(controls: &'c [Control], slot: &Slot) -> Option<&'c Control> {
    leaf_controls(controls)
        .into_iter()
        .find(|control| control.name == slot.name)
}

fn slot_text(control: &Control, part: SlotPart) -> String {
    match (&control.widget, part) {
        (Widget::DateTimeRange { from, .. }, SlotPart::From) => from.clone(),
        (Widget::DateTimeRange { to, .. }, SlotPart::To) => to.clone(),
        _ => control.text().unwrap_or_default().to_owned(),
    }
}

fn cycle_choice(selected: &str, options: &[SelectOption], step: isize) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let len = options.len() as isize;
    let next = match options.iter().position(|option| option.value == selected) {
        Some(index) => (index as isize + step).rem_euclid(len),
        None if step > 0 => 0,
        None => len - 1,
    };
    options.get(next as usize).map(|option| option.value.clone())
}

/// Turns a key on the focused slot into the edit its control accepts.
fn slot_edit(
    control: &Control,
    part: SlotPart,
    focus: &mut FieldFocus,
    key: KeyEvent,
) -> Option<EditValue> {
    let input = match (&control.widget, key.code) {
        (Widget::Toggle { .. }, KeyCode::Char(' ') | KeyCode::Enter) => Input::Toggle,
        (Widget::Choice { selected, options }, KeyCode::Left | KeyCode::Right) => {
            let step = if key.code == KeyCode::Right { 1 } else { -1 };
            Input::Choose(cycle_choice(selected, options, step)?)
        }
        (Widget::Toggle { .. } | Widget::Choice { .. }, _) => return None,
        (_, KeyCode::Char(ch)) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let draft = focus
                .draft
                .get_or_insert_with(|| slot_text(control, part));
            draft.push(ch);
            text_input(part, draft.clone())
        }
        (_, KeyCode::Backspace) => {
            let draft = focus
                .draft
                .get_or_insert_with(|| slot_text(control, part));
            draft.pop();
            text_input(part, draft.clone())
        }
        _ => return None,
    };
    control.accept(input)
}

fn text_input(part: SlotPart, text: String) -> Input {
    match part {
        SlotPart::Value => Input::Text(text),
        SlotPart::From => Input::From(text),
        SlotPart::To => Input::To(text),
    }
}

fn invalid_status(errors: &FieldErrors) -> String {
    match errors.len() {
        1 => "1 field needs attention".to_owned(),
        count => format!("{count} fields need attention"),
    }
}

fn handle_form_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };

    if key.code == KeyCode::Esc {
        let unsent = form.pending.take().is_some();
        let in_flight = form.engine.cancel();
        let message = if unsent {
            "submit cancelled before sending"
        } else if in_flight {
            "submit discarded"
        } else {
            "form closed"
        };
        view_data.form = None;
        state.dispatch(AppCommand::ExitToNav);
        emit_status(state, view_data, internal_tx, message);
        return;
    }

    let status = if form.busy() {
        Some("submitting...".to_owned())
    } else {
        match (key.code, key.modifiers) {
            (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                request_submit(form)
            }
            (KeyCode::Char('x'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                if form.engine.submit_error().is_some() {
                    form.engine.dismiss_submit_error();
                    Some("error dismissed".to_owned())
                } else {
                    None
                }
            }
            (KeyCode::Tab | KeyCode::Down, _) => {
                let slots = control_slots(&form.engine.controls()).len();
                form.focus.step(1, slots);
                None
            }
            (KeyCode::BackTab | KeyCode::Up, _) => {
                let slots = control_slots(&form.engine.controls()).len();
                form.focus.step(-1, slots);
                None
            }
            _ => edit_form_field(form, key),
        }
    };

    if let Some(message) = status {
        emit_status(state, view_data, internal_tx, message);
    }
}

fn edit_form_field(form: &mut FormOverlay, key: KeyEvent) -> Option<String> {
    let controls = form.engine.controls();
    let slot = control_slots(&controls).get(form.focus.index).cloned()?;
    let control = slot_control(&controls, &slot)?;
    let edit = slot_edit(control, slot.part, &mut form.focus, key)?;
    if form.engine.set_field(&slot.name, edit) {
        None
    } else {
        Some(format!("{} cannot be edited", control.label))
    }
}

fn request_submit(form: &mut FormOverlay) -> Option<String> {
    match form.engine.begin_submit::<()>() {
        Ok(values) => {
            form.pending = Some(values);
            form.focus.draft = None;
            None
        }
        Err(SubmitOutcome::Invalid(errors)) => {
            let slots = control_slots(&form.engine.controls());
            if let Some(index) = slots.iter().position(|slot| errors.contains_key(&slot.name)) {
                form.focus = FieldFocus::at(index);
            }
            Some(invalid_status(&errors))
        }
        Err(SubmitOutcome::Busy) => Some("submitting...".to_owned()),
        Err(_) => None,
    }
}

enum Settled {
    Done(String),
    Failed(String),
    Ignored,
}

fn settle<T>(outcome: SubmitOutcome<T>, describe: impl FnOnce(T) -> String) -> Settled {
    match outcome {
        SubmitOutcome::Committed(saved) => Settled::Done(describe(saved)),
        SubmitOutcome::Failed(message) => Settled::Failed(message),
        SubmitOutcome::Invalid(_) | SubmitOutcome::Busy | SubmitOutcome::Discarded => {
            Settled::Ignored
        }
    }
}

/// Sends the values a form handed out and reports the outcome.
fn finish_pending_submit<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    let Some(values) = form.pending.take() else {
        return;
    };

    let settled = match &form.target {
        FormTarget::NewOrder(order_type_id) => {
            let draft = OrderDraft::create(*order_type_id, values);
            let outcome = form.engine.complete_submit(runtime.submit_order(&draft));
            settle(outcome, |order| format!("created {}", order.code))
        }
        FormTarget::EditOrder(order) => {
            let draft = OrderDraft::update(order, values);
            let outcome = form.engine.complete_submit(runtime.submit_order(&draft));
            settle(outcome, |order| format!("saved {}", order.code))
        }
        FormTarget::Task(task_id) => {
            let result = match find_task(&view_data.tasks, task_id) {
                Some(task) => runtime
                    .submit_task(task, &values)
                    .map(|()| task.name.clone()),
                None => Err(SubmitError::Rejected(format!(
                    "task {task_id} is no longer in the inbox -- reload and pick it again"
                ))),
            };
            settle(form.engine.complete_submit(result), |name| {
                format!("completed {name}")
            })
        }
    };

    match settled {
        Settled::Done(message) => {
            view_data.form = None;
            view_data.detail = None;
            state.dispatch(AppCommand::ExitToNav);
            reload(state, runtime, view_data, internal_tx, message);
        }
        Settled::Failed(message) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("submit failed: {message}"),
        ),
        Settled::Ignored => {}
    }
}

fn filter_target_type(view_data: &ViewData) -> Option<OrderType> {
    if let Some(order) = selected_order(view_data) {
        return Some(current_type(view_data, order));
    }
    let bound = view_data.filters.as_ref().and_then(|panel| {
        view_data
            .order_types
            .iter()
            .find(|order_type| order_type.id == panel.order_type_id)
    });
    bound.or_else(|| view_data.order_types.first()).cloned()
}

fn open_filters(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_tab != TabKind::Orders {
        dispatch_command(state, view_data, internal_tx, AppCommand::OpenFilters);
        return;
    }
    let Some(order_type) = filter_target_type(view_data) else {
        emit_status(state, view_data, internal_tx, "no order types loaded");
        return;
    };
    let codec = view_data.codec;
    if let Some(panel) = view_data.filters.as_mut() {
        if panel.order_type_id != order_type.id {
            panel.rebind(&order_type);
        }
    } else {
        view_data.filters = Some(FilterPanel::new(&order_type, codec));
    }
    dispatch_command(state, view_data, internal_tx, AppCommand::OpenFilters);
}

fn handle_filter_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(panel) = view_data.filters.as_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };

    let mut close = false;
    let status = if panel.picker.is_some() {
        handle_picker_key(panel, key)
    } else {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => {
                close = true;
                None
            }
            (KeyCode::Char('n'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                if panel.engine.available_fields().is_empty() {
                    Some("no more fields to filter on".to_owned())
                } else {
                    panel.picker = Some(0);
                    None
                }
            }
            (KeyCode::Char('d'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                remove_focused_filter(panel)
            }
            (KeyCode::Char('r'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                panel.engine.reset();
                panel.focus = FieldFocus::default();
                Some("filters cleared".to_owned())
            }
            (KeyCode::Tab | KeyCode::Down, _) => {
                let slots = control_slots(&panel.engine.controls()).len();
                panel.focus.step(1, slots);
                None
            }
            (KeyCode::BackTab | KeyCode::Up, _) => {
                let slots = control_slots(&panel.engine.controls()).len();
                panel.focus.step(-1, slots);
                None
            }
            _ => {
                edit_filter_value(panel, key);
                None
            }
        }
    };

    clamp_cursors(view_data);
    if close {
        state.dispatch(AppCommand::ExitToNav);
    }
    if let Some(message) = status {
        emit_status(state, view_data, internal_tx, message);
    }
}

fn handle_picker_key(panel: &mut FilterPanel, key: KeyEvent) -> Option<String> {
    let index = panel.picker?;
    let available: Vec<String> = panel
        .engine
        .available_fields()
        .iter()
        .map(|field| field.name.clone())
        .collect();
    match key.code {
        KeyCode::Esc => panel.picker = None,
        KeyCode::Down | KeyCode::Char('j') => {
            panel.picker = Some((index + 1).min(available.len().saturating_sub(1)));
        }
        KeyCode::Up | KeyCode::Char('k') => panel.picker = Some(index.saturating_sub(1)),
        KeyCode::Enter => {
            panel.picker = None;
            let name = available.get(index)?;
            if !panel.engine.add_filter(name) {
                return None;
            }
            let slots = control_slots(&panel.engine.controls());
            let focus = slots
                .iter()
                .position(|slot| &slot.name == name)
                .unwrap_or_default();
            panel.focus = FieldFocus::at(focus);
            let label = panel.engine.get(name).map(|filter| filter.label.clone())?;
            return Some(format!("filtering on {label}"));
        }
        _ => {}
    }
    None
}

fn remove_focused_filter(panel: &mut FilterPanel) -> Option<String> {
    let slot = control_slots(&panel.engine.controls())
        .get(panel.focus.index)
        .cloned()?;
    let label = panel.engine.get(&slot.name).map(|filter| filter.label.clone())?;
    panel.engine.remove_filter(&slot.name);
    let slots = control_slots(&panel.engine.controls()).len();
    panel.focus = FieldFocus::at(panel.focus.index.min(slots.saturating_sub(1)));
    Some(format!("filter removed: {label}"))
}

fn edit_filter_value(panel: &mut FilterPanel, key: KeyEvent) {
    let controls = panel.engine.controls();
    let Some(slot) = control_slots(&controls).get(panel.focus.index).cloned() else {
        return;
    };
    let Some(control) = slot_control(&controls, &slot) else {
        return;
    };
    if let Some(edit) = slot_edit(control, slot.part, &mut panel.focus, key) {
        panel.engine.set_filter_input(&slot.name, edit);
    }
}

fn tab_title(tab: TabKind, view_data: &ViewData) -> String {
    format!("{} ({})", tab.label(), row_count(view_data, tab))
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles = TabKind::ALL
        .iter()
        .map(|tab| tab_title(*tab, view_data))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("orderdesk").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.active_tab {
        TabKind::Orders => render_orders(frame, layout[1], view_data),
        TabKind::Tasks => render_tasks(frame, layout[1], view_data),
        TabKind::OrderTypes => render_order_types(frame, layout[1], view_data),
    }

    let status_widget = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(detail) = &view_data.detail {
        let area = centered_rect(70, 75, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(render_detail_text(detail, view_data.codec))
            .block(Block::default().title("detail").borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if state.mode == AppMode::Filter
        && let Some(panel) = &view_data.filters
    {
        let area = centered_rect(64, 60, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(render_filter_text(panel))
            .block(Block::default().title("filters").borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if let Some(form) = &view_data.form {
        let area = centered_rect(76, 82, frame.area());
        frame.render_widget(Clear, area);
        let style = if form.busy() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        let body = Paragraph::new(render_form_text(form)).style(style).block(
            Block::default()
                .title(form.title.as_str())
                .borders(Borders::ALL),
        );
        frame.render_widget(body, area);
    }
}

fn status_text(state: &AppState) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    let hint = match state.mode {
        AppMode::Nav => {
            "tab switch · enter open · n new · e edit · f filter · a archived · r reload · q quit"
        }
        AppMode::Detail => "e edit · n new · esc back",
        AppMode::Filter => "tab next · ctrl+n add · ctrl+d remove · ctrl+r reset · esc done",
        AppMode::Form => "tab next · space toggle · ←/→ choose · ctrl+s submit · esc cancel",
    };
    hint.to_owned()
}

fn draw_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: String,
    headers: &[&str],
    rows: Vec<(Vec<String>, Style)>,
    selected: usize,
) {
    let header = Row::new(headers.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let body = rows.into_iter().enumerate().map(|(index, (cells, style))| {
        let style = if index == selected {
            style.bg(Color::DarkGray).add_modifier(Modifier::BOLD)
        } else {
            style
        };
        Row::new(cells.into_iter().map(Cell::from)).style(style)
    });
    let widths = vec![Constraint::Min(6); headers.len().max(1)];
    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_orders(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let rows = visible_orders(view_data)
        .into_iter()
        .map(|order| {
            let style = if order.archived {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            (order_row_cells(order, view_data.codec), style)
        })
        .collect();
    draw_table(
        frame,
        area,
        orders_title(view_data),
        &["code", "type", "state", "created", "updated"],
        rows,
        view_data.cursor.orders,
    );
}

fn orders_title(view_data: &ViewData) -> String {
    let active: Vec<&str> = view_data
        .filters
        .iter()
        .flat_map(|panel| panel.engine.active())
        .filter(|(_, filter)| !filter.value.is_empty())
        .map(|(_, filter)| filter.label.as_str())
        .collect();
    if active.is_empty() {
        return "orders".to_owned();
    }
    format!(
        "orders · {} of {} · filtered by {}",
        visible_orders(view_data).len(),
        view_data.orders.len(),
        active.join(", ")
    )
}

fn order_row_cells(order: &Order, codec: Codec) -> Vec<String> {
    let state = if order.archived {
        format!("{} (archived)", order.state.label())
    } else {
        order.state.label().to_owned()
    };
    vec![
        order.code.clone(),
        order.order_type.name.clone(),
        state,
        codec.format_date(order.created_at),
        codec.format_date(order.updated_at),
    ]
}

fn render_tasks(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let rows = view_data
        .tasks
        .iter()
        .map(|task| {
            let urgent = task
                .due
                .is_some_and(|due| DueStatus::from_due(due, view_data.now).is_urgent());
            let style = if urgent {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            (task_row_cells(task, view_data.now), style)
        })
        .collect();
    draw_table(
        frame,
        area,
        "tasks · c claim".to_owned(),
        &["task", "process", "order", "due", "age", "priority", "assignee"],
        rows,
        view_data.cursor.tasks,
    );
}

fn task_row_cells(task: &Task, now: OffsetDateTime) -> Vec<String> {
    vec![
        task.name.clone(),
        task.process_name.clone(),
        task.entity_code.clone(),
        task.due
            .map(|due| DueStatus::from_due(due, now).text())
            .unwrap_or_else(|| PLACEHOLDER.to_owned()),
        relative_time(task.created, now),
        task.priority.to_string(),
        task.assignee
            .clone()
            .unwrap_or_else(|| PLACEHOLDER.to_owned()),
    ]
}

fn render_order_types(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let rows = view_data
        .order_types
        .iter()
        .map(|order_type| {
            let style = if order_type.active {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let cells = vec![
                order_type.code.clone(),
                order_type.name.clone(),
                yes_no(order_type.active).to_owned(),
                order_type.fields.leaves().len().to_string(),
            ];
            (cells, style)
        })
        .collect();
    draw_table(
        frame,
        area,
        "order types".to_owned(),
        &["code", "name", "active", "fields"],
        rows,
        view_data.cursor.order_types,
    );
}

fn render_detail_text(detail: &DetailView, codec: Codec) -> String {
    let mut lines = Vec::new();
    match detail {
        DetailView::Order(order) => {
            lines.push(format!("{} · {}", order.code, order.order_type.name));
            lines.push(format!("state: {}", order.state.label()));
            lines.push(format!("created: {}", codec.format_date_time(order.created_at)));
            lines.push(format!("updated: {}", codec.format_date_time(order.updated_at)));
            if let Some(ext_code) = &order.ext_code {
                lines.push(format!("external code: {ext_code}"));
            }
            if let Some(estimated) = order.estimated_exec_date {
                lines.push(format!("estimated: {}", codec.format_date(estimated)));
            }
            if let Some(done_at) = order.done_at {
                lines.push(format!("done: {}", codec.format_date_time(done_at)));
            }
            if let Some(user) = &order.user {
                lines.push(format!("owner: {}", user.full_name()));
            }
            if order.archived {
                lines.push("archived".to_owned());
            }
            lines.push(String::new());

            let errors = BTreeMap::new();
            let ctx = RenderContext::new(codec, &order.data, &errors);
            let controls = render_fields(&order.order_type.fields, Mode::Display, ctx);
            push_control_lines(&controls, None, 0, &mut lines);
        }
        DetailView::OrderType(order_type) => {
            lines.push(format!("{} ({})", order_type.name, order_type.code));
            lines.push(format!("active: {}", yes_no(order_type.active)));
            lines.push(String::new());
            push_schema_lines(order_type.fields.as_slice(), 0, &mut lines);
        }
    }
    lines.join("\n")
}

fn push_schema_lines(fields: &[FieldSchema], depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for field in fields {
        let mut traits = vec![field.field_type().as_str()];
        if field.required {
            traits.push("required");
        }
        if !field.editable {
            traits.push("read-only");
        }
        if !field.visible {
            traits.push("hidden");
        }
        lines.push(format!(
            "{indent}{} ({})",
            field.display_label(),
            traits.join(", ")
        ));
        push_schema_lines(field.fields(), depth + 1, lines);
    }
}

type Focused<'f> = Option<(&'f Slot, &'f FieldFocus)>;

fn push_control_lines(
    controls: &[Control],
    focused: Focused<'_>,
    depth: usize,
    lines: &mut Vec<String>,
) {
    let indent = "  ".repeat(depth);
    for control in controls {
        match &control.widget {
            Widget::Section { label, children } => {
                lines.push(format!("{indent}{label}"));
                push_control_lines(children, focused, depth + 1, lines);
            }
            Widget::Static { html } => lines.push(format!("{indent}{}", strip_tags(html))),
            widget => {
                let here = focused.filter(|(slot, _)| slot.name == control.name);
                let marker = if here.is_some() { CURSOR_MARK } else { " " };
                let required = if control.required { "*" } else { "" };
                let mut line = format!(
                    "{indent}{marker} {}{required}: {}",
                    control.label,
                    widget_text(widget, here)
                );
                if let Some(error) = &control.error {
                    line.push_str(&format!("  ! {error}"));
                }
                lines.push(line);
            }
        }
    }
}

fn draft_for<'f>(focused: Focused<'f>, part: SlotPart) -> Option<&'f str> {
    focused
        .filter(|(slot, _)| slot.part == part)
        .and_then(|(_, focus)| focus.draft.as_deref())
}

fn input_text(draft: Option<&str>, value: &str, placeholder: Option<&str>) -> String {
    match draft {
        Some(draft) => format!("{draft}▏"),
        None if value.is_empty() => placeholder
            .map(|placeholder| format!("<{placeholder}>"))
            .unwrap_or_default(),
        None => value.to_owned(),
    }
}

fn widget_text(widget: &Widget, focused: Focused<'_>) -> String {
    let draft = draft_for(focused, SlotPart::Value);
    match widget {
        Widget::TextInput { value, placeholder }
        | Widget::TextArea {
            value, placeholder, ..
        } => input_text(draft, value, placeholder.as_deref()),
        Widget::NumberInput { value } => input_text(draft, value, None),
        Widget::DateTime { value } => input_text(draft, value, Some(DATETIME_HINT)),
        Widget::Toggle { checked: true } => "[x]".to_owned(),
        Widget::Toggle { checked: false } => "[ ]".to_owned(),
        Widget::Choice { selected, options } => {
            let label = options
                .iter()
                .find(|option| &option.value == selected)
                .map(|option| option.label.as_str())
                .filter(|label| !label.is_empty())
                .unwrap_or(PLACEHOLDER);
            format!("‹ {label} ›")
        }
        Widget::DateTimeRange { from, to } => format!(
            "{} {RANGE_ARROW} {}",
            input_text(draft_for(focused, SlotPart::From), from, Some("from")),
            input_text(draft_for(focused, SlotPart::To), to, Some("to")),
        ),
        Widget::Text { text } => text.clone(),
        Widget::Static { html } => strip_tags(html),
        Widget::Section { label, .. } => label.clone(),
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_owned()
}

fn render_form_text(form: &FormOverlay) -> String {
    let controls = form.engine.controls();
    let slots = control_slots(&controls);
    let focused = slots.get(form.focus.index).map(|slot| (slot, &form.focus));

    let mut lines = Vec::new();
    push_control_lines(&controls, focused, 0, &mut lines);
    lines.push(String::new());
    let has_error = form.engine.submit_error().is_some();
    if let Some(error) = form.engine.submit_error() {
        lines.push(format!("error: {error}"));
    }
    if form.busy() {
        lines.push("submitting...".to_owned());
    } else if has_error {
        lines.push("ctrl+s submit · ctrl+x dismiss error · esc cancel".to_owned());
    } else {
        lines.push("ctrl+s submit · esc cancel".to_owned());
    }
    lines.join("\n")
}

fn render_filter_text(panel: &FilterPanel) -> String {
    let mut lines = vec![format!("filters for {}", panel.type_name), String::new()];

    if panel.engine.active().is_empty() {
        lines.push("no filters -- ctrl+n adds one".to_owned());
    } else {
        let controls = panel.engine.controls();
        let slots = control_slots(&controls);
        let focused = slots.get(panel.focus.index).map(|slot| (slot, &panel.focus));
        push_control_lines(&controls, focused, 0, &mut lines);
    }

    if let Some(index) = panel.picker {
        lines.push(String::new());
        lines.push("add filter (enter picks, esc closes):".to_owned());
        for (position, field) in panel.engine.available_fields().into_iter().enumerate() {
            let marker = if position == index { CURSOR_MARK } else { " " };
            lines.push(format!(
                "{marker} {} ({})",
                field.display_label(),
                field.field_type().as_str()
            ));
        }
    }
    lines.join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, DetailView, InternalEvent, SourceRuntime, ViewData, emit_status,
        finish_pending_submit, handle_key_event, process_internal_events, refresh_view_data,
        render_detail_text, render_filter_text, render_form_text, status_text, task_row_cells,
        visible_orders,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use orderdesk_app::{AppMode, AppState, Codec, FormPhase, SubmitError, TabKind};
    use orderdesk_testkit::{MemorySource, fixture_now};
    use serde_json::json;
    use std::sync::mpsc::{self, Receiver, Sender};

    struct Harness {
        state: AppState,
        runtime: SourceRuntime<MemorySource>,
        view: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_source(MemorySource::fixtures())
        }

        fn with_source(source: MemorySource) -> Self {
            let mut runtime = SourceRuntime::new(source, Codec::UTC).with_clock(fixture_now());
            let state = AppState::default();
            let mut view = ViewData::new(runtime.codec(), runtime.now());
            refresh_view_data(&state, &mut runtime, &mut view).expect("fixtures load");
            let (tx, rx) = mpsc::channel();
            Self {
                state,
                runtime,
                view,
                tx,
                rx,
            }
        }

        fn key(&mut self, key: KeyEvent) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view,
                &self.tx,
                key,
            )
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.key(KeyEvent::new(code, KeyModifiers::NONE))
        }

        fn ctrl(&mut self, ch: char) -> bool {
            self.key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn settle(&mut self) {
            finish_pending_submit(&mut self.state, &mut self.runtime, &mut self.view, &self.tx);
        }

        fn status(&self) -> Option<&str> {
            self.state.status_line.as_deref()
        }

        fn form_text(&self) -> String {
            render_form_text(self.view.form.as_ref().expect("form open"))
        }

        fn visible_codes(&self) -> Vec<String> {
            visible_orders(&self.view)
                .into_iter()
                .map(|order| order.code.clone())
                .collect()
        }
    }

    #[test]
    fn lists_load_newest_first_and_tabs_cycle() {
        let mut h = Harness::new();
        assert_eq!(h.visible_codes(), vec!["ORD-1234", "ORD-1235", "ORD-1236"]);
        assert_eq!(h.view.tasks.len(), 2);
        assert_eq!(h.view.order_types.len(), 4);

        assert!(!h.press(KeyCode::Tab));
        assert_eq!(h.state.active_tab, TabKind::Tasks);
        h.press(KeyCode::BackTab);
        h.press(KeyCode::BackTab);
        assert_eq!(h.state.active_tab, TabKind::OrderTypes);

        assert!(h.press(KeyCode::Char('q')));
    }

    #[test]
    fn enter_opens_order_detail_in_display_mode() {
        let mut h = Harness::new();
        h.press(KeyCode::Enter);
        assert_eq!(h.state.mode, AppMode::Detail);

        let detail = h.view.detail.as_ref().expect("detail open");
        let text = render_detail_text(detail, h.view.codec);
        assert!(text.contains("ORD-1234 · New Customer"));
        assert!(text.contains("state: In Progress"));
        assert!(text.contains("Customer Name: John Doe"));
        assert!(text.contains("Install Date: 2/1/2024, 10:00:00 AM"));
        assert!(text.contains("external code: EXT-001"));

        h.press(KeyCode::Esc);
        assert_eq!(h.state.mode, AppMode::Nav);
        assert!(h.view.detail.is_none());
    }

    #[test]
    fn new_order_form_blocks_blank_submit_then_creates_once() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('n'));
        assert_eq!(h.state.mode, AppMode::Form);
        assert_eq!(
            h.view.form.as_ref().map(|form| form.title.as_str()),
            Some("new New Customer order")
        );

        h.ctrl('s');
        assert_eq!(h.status(), Some("4 fields need attention"));
        assert!(h.view.form.as_ref().is_some_and(|form| form.pending.is_none()));
        assert!(h.form_text().contains("Customer Name is required"));

        h.type_text("Ada Lovelace");
        h.press(KeyCode::Tab);
        h.type_text("+15550100");
        h.press(KeyCode::Tab);
        h.press(KeyCode::Tab);
        h.type_text("Boston");
        h.press(KeyCode::Tab);
        h.type_text("2024-03-01T09:30");
        assert!(!h.form_text().contains("is required"));

        h.ctrl('s');
        assert!(h.form_text().contains("submitting..."));
        h.press(KeyCode::Char('x'));
        assert_eq!(h.status(), Some("submitting..."));
        assert_eq!(h.runtime.source().submit_calls, 0);

        h.settle();
        assert_eq!(h.runtime.source().submit_calls, 1);
        assert_eq!(h.status(), Some("created ORD-1004"));
        assert!(h.view.form.is_none());
        assert_eq!(h.state.mode, AppMode::Nav);
        assert_eq!(h.view.orders.len(), 4);

        let created = &h.runtime.source().orders[0];
        assert_eq!(created.code, "ORD-1004");
        assert_eq!(created.data.get("customerName"), Some(&json!("Ada Lovelace")));
        assert_eq!(
            created.data.get("installDate"),
            Some(&json!("2024-03-01T09:30:00Z"))
        );
    }

    #[test]
    fn rejected_submit_keeps_form_and_message() {
        let mut h = Harness::new();
        h.runtime
            .source_mut()
            .fail_next_submit(SubmitError::Rejected("customerPhone is invalid".to_owned()));

        h.press(KeyCode::Char('e'));
        h.ctrl('s');
        h.settle();

        let form = h.view.form.as_ref().expect("form stays open");
        assert_eq!(form.engine.phase(), FormPhase::Idle);
        assert_eq!(form.engine.submit_error(), Some("customerPhone is invalid"));
        assert!(h.form_text().contains("error: customerPhone is invalid"));
        assert_eq!(h.status(), Some("submit failed: customerPhone is invalid"));

        h.ctrl('s');
        h.settle();
        assert_eq!(h.status(), Some("saved ORD-1234"));
        assert_eq!(h.runtime.source().submit_calls, 2);
    }

    #[test]
    fn submit_error_banner_can_be_dismissed() {
        let mut h = Harness::new();
        h.runtime
            .source_mut()
            .fail_next_submit(SubmitError::Rejected("customerPhone is invalid".to_owned()));

        h.press(KeyCode::Char('e'));
        h.ctrl('s');
        h.settle();
        assert!(h.form_text().contains("error: customerPhone is invalid"));
        assert!(h.form_text().contains("ctrl+x dismiss error"));

        h.ctrl('x');
        let form = h.view.form.as_ref().expect("form stays open");
        assert_eq!(form.engine.submit_error(), None);
        assert_eq!(form.engine.phase(), FormPhase::Idle);
        assert!(!h.form_text().contains("error:"));
        assert_eq!(h.status(), Some("error dismissed"));
        assert_eq!(h.runtime.source().submit_calls, 1);
    }

    #[test]
    fn expired_session_is_reported_on_submit() {
        let mut h = Harness::new();
        h.runtime
            .source_mut()
            .fail_next_submit(SubmitError::SessionExpired);
        h.press(KeyCode::Char('e'));
        h.ctrl('s');
        h.settle();
        assert_eq!(
            h.status(),
            Some("submit failed: session expired -- sign in again and resubmit")
        );
    }

    #[test]
    fn escape_before_sending_drops_the_submit() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('e'));
        h.ctrl('s');
        h.press(KeyCode::Esc);
        assert!(h.view.form.is_none());
        assert_eq!(h.status(), Some("submit cancelled before sending"));

        h.settle();
        assert_eq!(h.runtime.source().submit_calls, 0);
    }

    #[test]
    fn text_filter_narrows_orders_and_survives_leaving_the_panel() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('f'));
        assert_eq!(h.state.mode, AppMode::Filter);

        h.ctrl('n');
        h.press(KeyCode::Enter);
        assert_eq!(h.status(), Some("filtering on Customer Name"));
        h.type_text("john");
        assert_eq!(h.visible_codes(), vec!["ORD-1234"]);

        let panel = h.view.filters.as_ref().expect("panel open");
        let text = render_filter_text(panel);
        assert!(text.contains("filters for New Customer"));
        assert!(text.contains("Customer Name: john"));

        h.press(KeyCode::Esc);
        assert_eq!(h.state.mode, AppMode::Nav);
        assert_eq!(h.visible_codes(), vec!["ORD-1234"]);

        h.press(KeyCode::Char('F'));
        assert_eq!(h.visible_codes().len(), 3);
    }

    #[test]
    fn date_range_filter_is_inclusive_and_keeps_undated_orders() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('f'));
        h.ctrl('n');
        for _ in 0..4 {
            h.press(KeyCode::Down);
        }
        h.press(KeyCode::Enter);
        assert_eq!(h.status(), Some("filtering on Install Date"));

        h.type_text("2024-01-01T00:00");
        assert_eq!(h.visible_codes().len(), 3);

        h.press(KeyCode::Tab);
        h.type_text("2024-01-31T00:00");
        assert_eq!(h.visible_codes(), vec!["ORD-1235", "ORD-1236"]);

        h.ctrl('d');
        assert_eq!(h.status(), Some("filter removed: Install Date"));
        assert_eq!(h.visible_codes().len(), 3);
    }

    #[test]
    fn filters_stay_on_the_orders_tab() {
        let mut h = Harness::new();
        h.press(KeyCode::Tab);
        h.press(KeyCode::Char('f'));
        assert_eq!(h.state.mode, AppMode::Nav);
        assert_eq!(h.status(), Some("filters apply to orders"));
    }

    #[test]
    fn task_form_submits_through_the_runtime() {
        let mut h = Harness::new();
        h.press(KeyCode::Tab);
        h.press(KeyCode::Enter);
        assert_eq!(h.state.mode, AppMode::Form);
        assert_eq!(
            h.view.form.as_ref().map(|form| form.title.as_str()),
            Some("Process New Customer Application · ORD-1234")
        );

        h.press(KeyCode::Char(' '));
        assert!(h.form_text().contains("Application Approved*: [x]"));
        h.press(KeyCode::Tab);
        h.type_text("2024-01-18T09:00");
        h.ctrl('s');
        h.settle();

        assert_eq!(h.status(), Some("completed Process New Customer Application"));
        assert_eq!(h.view.tasks.len(), 1);
        let submission = &h.runtime.source().submissions[0];
        assert_eq!(submission.code, "111111");
        assert_eq!(submission.data.get("approved"), Some(&json!(true)));
        assert_eq!(
            submission.data.get("installSlot"),
            Some(&json!("2024-01-18T09:00:00Z"))
        );
    }

    #[test]
    fn select_fields_cycle_with_arrow_keys() {
        let mut h = Harness::new();
        h.press(KeyCode::Tab);
        h.press(KeyCode::Down);
        h.press(KeyCode::Enter);

        h.press(KeyCode::Right);
        assert!(h.form_text().contains("Resolution*: ‹ Fixed ›"));
        h.press(KeyCode::Left);
        h.press(KeyCode::Left);
        assert!(h.form_text().contains("Resolution*: ‹ Escalated ›"));
    }

    #[test]
    fn claim_marks_the_task_and_reloads() {
        let mut h = Harness::new();
        h.press(KeyCode::Tab);
        h.press(KeyCode::Char('c'));
        assert_eq!(h.runtime.source().claimed.len(), 1);
        assert_eq!(h.status(), Some("claimed Process New Customer Application"));
        assert_eq!(h.view.tasks[0].assignee.as_deref(), Some("me"));
    }

    #[test]
    fn task_rows_show_due_status_and_age() {
        let h = Harness::new();
        assert_eq!(
            task_row_cells(&h.view.tasks[0], fixture_now()),
            vec![
                "Process New Customer Application",
                "New Customer Process",
                "ORD-1234",
                "5d to due date",
                "22h ago",
                "50",
                "demo",
            ]
        );
        assert_eq!(
            task_row_cells(&h.view.tasks[1], fixture_now())[3],
            "1d to due date"
        );
    }

    #[test]
    fn archived_toggle_reloads_orders() {
        let mut h = Harness::new();
        let before = h.runtime.source().list_calls;
        h.press(KeyCode::Char('a'));
        assert!(h.state.show_archived);
        assert_eq!(h.runtime.source().list_calls, before + 1);
        assert_eq!(h.status(), Some("archived shown"));
    }

    #[test]
    fn order_type_detail_lists_schema_and_opens_new_form() {
        let mut h = Harness::new();
        h.press(KeyCode::BackTab);
        assert_eq!(h.state.active_tab, TabKind::OrderTypes);
        h.press(KeyCode::Enter);

        let Some(detail @ DetailView::OrderType(_)) = h.view.detail.as_ref() else {
            panic!("order type detail expected");
        };
        let text = render_detail_text(detail, h.view.codec);
        assert!(text.contains("New Customer (new_customer)"));
        assert!(text.contains("Customer Name (string, required)"));

        h.press(KeyCode::Char('n'));
        assert_eq!(h.state.mode, AppMode::Form);
        assert!(h.view.detail.is_none());
    }

    #[test]
    fn inactive_order_type_refuses_new_orders() {
        let mut source = MemorySource::fixtures();
        source.order_types[1].active = false;
        let mut h = Harness::with_source(source);
        h.press(KeyCode::BackTab);
        h.press(KeyCode::Down);
        h.press(KeyCode::Char('n'));
        assert!(h.view.form.is_none());
        assert_eq!(h.status(), Some("order type Support Request is inactive"));
    }

    #[test]
    fn only_latest_status_token_clears() {
        let mut h = Harness::new();
        emit_status(&mut h.state, &mut h.view, &h.tx, "first");
        emit_status(&mut h.state, &mut h.view, &h.tx, "second");

        h.tx.send(InternalEvent::ClearStatus { token: 1 })
            .expect("send clear");
        process_internal_events(&mut h.state, &mut h.view, &h.rx);
        assert_eq!(h.status(), Some("second"));

        h.tx.send(InternalEvent::ClearStatus { token: 2 })
            .expect("send clear");
        process_internal_events(&mut h.state, &mut h.view, &h.rx);
        assert_eq!(h.status(), None);
        assert!(status_text(&h.state).starts_with("tab switch"));
    }
}
