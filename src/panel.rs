// 🎛️ Filter Panel Controller - active filters + one editing session
//
// Session lifecycle: Closed → Editing(form) → Submitting → Closed on success,
// or back to Editing with an inline error on failure. Every successful
// mutation reloads the panel and its listing (without scrolling).

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{FilterError, GatewayError, PanelError};
use crate::filters::{Filter, FilterSet, FilterValue};
use crate::operators::{FieldType, Operator};
use crate::registry::ListingModule;
use crate::schema::{Choice, FieldOption, ListingSchema};
use crate::store::{FilterPatch, FilterStore};

// ============================================================================
// EDIT FORMS
// ============================================================================

/// Value control(s) of integer and datetime forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueInput {
    Single(String),
    Bounds { low: String, high: String },
}

impl ValueInput {
    fn from_value(value: FilterValue) -> Self {
        match value {
            FilterValue::Pair(low, high) => ValueInput::Bounds { low, high },
            FilterValue::Scalar(s) => ValueInput::Single(s),
            FilterValue::Bool(b) => ValueInput::Single(b.to_string()),
            FilterValue::Empty => ValueInput::Single(String::new()),
        }
    }

    /// Swap between one control and two bound controls
    fn reshape(self, range: bool) -> Self {
        match (self, range) {
            (ValueInput::Single(s), true) => ValueInput::Bounds {
                low: s,
                high: String::new(),
            },
            (ValueInput::Bounds { low, .. }, false) => ValueInput::Single(low),
            (same, _) => same,
        }
    }

    fn value(&self) -> FilterValue {
        match self {
            ValueInput::Single(s) => FilterValue::Scalar(s.clone()),
            ValueInput::Bounds { low, high } => FilterValue::Pair(low.clone(), high.clone()),
        }
    }
}

/// Which bound control a keystroke goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Low,
    High,
}

/// Type-specific editing form, one variant per field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditForm {
    /// Two direct actions, true and false; no operator choice
    Boolean,
    List {
        choices: Vec<Choice>,
        selected: Option<String>,
    },
    Integer {
        operator: Operator,
        input: ValueInput,
    },
    DateTime {
        operator: Operator,
        input: ValueInput,
    },
    String {
        operator: Operator,
        text: String,
    },
}

impl EditForm {
    /// Blank form, or one prefilled from an existing filter
    pub fn new(field_type: FieldType, choices: Vec<Choice>, existing: Option<&Filter>) -> Self {
        let operator = existing
            .map(Filter::operator)
            .unwrap_or_else(|| field_type.default_operator());
        let value = existing.map(Filter::value);

        match field_type {
            FieldType::Boolean => EditForm::Boolean,
            FieldType::List => EditForm::List {
                selected: match value {
                    Some(FilterValue::Scalar(s)) => Some(s),
                    _ => choices.first().map(|c| c.value.clone()),
                },
                choices,
            },
            FieldType::Integer | FieldType::DateTime => {
                let input = value
                    .map(ValueInput::from_value)
                    .unwrap_or_else(|| ValueInput::Single(String::new()))
                    .reshape(operator.is_range());
                if field_type == FieldType::Integer {
                    EditForm::Integer { operator, input }
                } else {
                    EditForm::DateTime { operator, input }
                }
            }
            FieldType::String => EditForm::String {
                operator,
                text: match value {
                    Some(FilterValue::Scalar(s)) => s,
                    _ => String::new(),
                },
            },
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            EditForm::Boolean => FieldType::Boolean,
            EditForm::List { .. } => FieldType::List,
            EditForm::Integer { .. } => FieldType::Integer,
            EditForm::DateTime { .. } => FieldType::DateTime,
            EditForm::String { .. } => FieldType::String,
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            EditForm::Boolean | EditForm::List { .. } => Operator::Exact,
            EditForm::Integer { operator, .. }
            | EditForm::DateTime { operator, .. }
            | EditForm::String { operator, .. } => *operator,
        }
    }

    /// Dropdown content; empty when the form has no operator choice
    pub fn operator_choices(&self) -> &'static [Operator] {
        match self {
            EditForm::Boolean | EditForm::List { .. } => &[],
            other => other.field_type().operators(),
        }
    }

    /// Pick an operator from the dropdown. Selecting or leaving `range`
    /// swaps the value control(s) without touching anything remote.
    pub fn select_operator(&mut self, selected: Operator) -> Result<(), FilterError> {
        let field_type = self.field_type();
        if self.operator_choices().is_empty() || !field_type.allows(selected) {
            return Err(FilterError::InvalidOperator {
                field_type,
                operator: selected,
            });
        }
        match self {
            EditForm::Integer { operator, input } | EditForm::DateTime { operator, input } => {
                *operator = selected;
                let current = std::mem::replace(input, ValueInput::Single(String::new()));
                *input = current.reshape(selected.is_range());
            }
            EditForm::String { operator, .. } => *operator = selected,
            EditForm::Boolean | EditForm::List { .. } => {}
        }
        Ok(())
    }

    /// Step through the dropdown (wraps around)
    pub fn cycle_operator(&mut self, forward: bool) {
        let choices = self.operator_choices();
        if choices.is_empty() {
            return;
        }
        let current = choices.iter().position(|op| *op == self.operator()).unwrap_or(0);
        let next = if forward {
            (current + 1) % choices.len()
        } else {
            (current + choices.len() - 1) % choices.len()
        };
        let _ = self.select_operator(choices[next]);
    }

    /// Text of the single value control (or of one bound)
    pub fn text_mut(&mut self, bound: Bound) -> Option<&mut String> {
        match self {
            EditForm::String { text, .. } => Some(text),
            EditForm::Integer { input, .. } | EditForm::DateTime { input, .. } => match input {
                ValueInput::Single(s) => Some(s),
                ValueInput::Bounds { low, high } => Some(match bound {
                    Bound::Low => low,
                    Bound::High => high,
                }),
            },
            EditForm::Boolean | EditForm::List { .. } => None,
        }
    }

    pub fn select_choice(&mut self, value: &str) -> Result<(), FilterError> {
        match self {
            EditForm::List { choices, selected } => {
                if !choices.is_empty() && !choices.iter().any(|c| c.value == value) {
                    return Err(FilterError::InvalidValue {
                        field: "value".to_string(),
                        message: "Select a valid choice.".to_string(),
                    });
                }
                *selected = Some(value.to_string());
                Ok(())
            }
            _ => Err(FilterError::InvalidOperator {
                field_type: self.field_type(),
                operator: Operator::Exact,
            }),
        }
    }

    /// Move the list selection up or down
    pub fn cycle_choice(&mut self, forward: bool) {
        if let EditForm::List { choices, selected } = self {
            if choices.is_empty() {
                return;
            }
            let current = selected
                .as_ref()
                .and_then(|s| choices.iter().position(|c| &c.value == s));
            let next = match (current, forward) {
                (None, _) => 0,
                (Some(i), true) => (i + 1) % choices.len(),
                (Some(i), false) => (i + choices.len() - 1) % choices.len(),
            };
            *selected = Some(choices[next].value.clone());
        }
    }

    pub fn value(&self) -> FilterValue {
        match self {
            EditForm::Boolean => FilterValue::Empty,
            EditForm::List { selected, .. } => selected
                .clone()
                .map(FilterValue::Scalar)
                .unwrap_or(FilterValue::Empty),
            EditForm::Integer { input, .. } | EditForm::DateTime { input, .. } => input.value(),
            EditForm::String { operator, text } => {
                if operator.takes_value() {
                    FilterValue::Scalar(text.clone())
                } else {
                    FilterValue::Empty
                }
            }
        }
    }
}

// ============================================================================
// EDIT SESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    Submitting,
}

/// Error shown inside the open form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineError {
    /// Offending control (`operator`, `value`, ...), if known
    pub control: Option<String>,
    pub message: String,
}

impl InlineError {
    fn from_filter(err: &FilterError) -> Self {
        let control = match err {
            FilterError::InvalidOperator { .. } => Some("operator".to_string()),
            FilterError::InvalidValue { .. } => Some("value".to_string()),
            _ => None,
        };
        let message = match err {
            FilterError::InvalidValue { message, .. } => message.clone(),
            other => other.to_string(),
        };
        InlineError { control, message }
    }

    fn from_gateway(err: &GatewayError) -> Self {
        match err.field_message() {
            Some((control, message)) => InlineError {
                control: Some(control.to_string()),
                message: message.to_string(),
            },
            None => InlineError {
                control: None,
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub field: String,
    pub display_name: String,
    pub mode: SessionMode,
    pub form: EditForm,
    pub state: SessionState,
    pub error: Option<InlineError>,
}

// ============================================================================
// PANEL SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSummary {
    pub field: String,
    pub display_name: String,
    pub field_type: FieldType,
    pub operator: Operator,
    pub text: String,
}

/// Everything the rendering layer needs to draw the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSnapshot {
    pub filters: Vec<FilterSummary>,
    pub add_options: Vec<FieldOption>,
    pub session: Option<EditSession>,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct FilterPanelController {
    store: Arc<FilterStore>,
    listing: Arc<dyn ListingModule>,
    active: FilterSet,
    schema: ListingSchema,
    session: Option<EditSession>,
}

impl FilterPanelController {
    pub fn new(store: Arc<FilterStore>, listing: Arc<dyn ListingModule>) -> Self {
        FilterPanelController {
            store,
            listing,
            active: FilterSet::new(),
            schema: ListingSchema::default(),
            session: None,
        }
    }

    pub fn active(&self) -> &FilterSet {
        &self.active
    }

    pub fn schema(&self) -> &ListingSchema {
        &self.schema
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    /// Re-fetch active filters and schema from the server
    pub async fn load(&mut self) -> Result<(), GatewayError> {
        self.schema = self.store.fetch_schema().await;
        self.active = self.store.fetch_active().await?;
        Ok(())
    }

    pub async fn remove(&mut self, field: &str) -> Result<(), PanelError> {
        if !self.active.contains(field) {
            return Err(FilterError::UnknownField(field.to_string()).into());
        }
        self.store.delete(field).await?;
        info!(field, "filter removed");
        self.after_mutation().await;
        Ok(())
    }

    pub async fn change_operator(&mut self, field: &str, operator: Operator) -> Result<(), PanelError> {
        let mut filter = self.existing(field)?;
        filter.set_operator(operator)?;
        self.store.update(field, &FilterPatch::from_filter(&filter)).await?;
        info!(field, %operator, "filter operator changed");
        self.after_mutation().await;
        Ok(())
    }

    pub async fn set_value(&mut self, field: &str, value: FilterValue) -> Result<(), PanelError> {
        let mut filter = self.existing(field)?;
        filter.set_value(value)?;
        self.store
            .update(
                field,
                &FilterPatch {
                    operator: None,
                    value: Some(filter.to_record().value),
                },
            )
            .await?;
        info!(field, "filter value changed");
        self.after_mutation().await;
        Ok(())
    }

    fn existing(&self, field: &str) -> Result<Filter, FilterError> {
        self.active
            .get(field)
            .cloned()
            .ok_or_else(|| FilterError::UnknownField(field.to_string()))
    }

    async fn after_mutation(&mut self) {
        if let Err(err) = self.load().await {
            warn!(error = %err, "could not refresh filter panel");
        }
        self.listing.reload(false).await;
    }

    /// Start a new filter. Fields that are already filtered are refused
    /// before anything is sent.
    pub fn open_create(&mut self, field: &str) -> Result<&EditSession, PanelError> {
        if self.active.contains(field) {
            return Err(FilterError::DuplicateField(field.to_string()).into());
        }
        let field_type = self
            .schema
            .filter_type(field)
            .ok_or_else(|| FilterError::NotFilterable(field.to_string()))?;

        let form = EditForm::new(field_type, self.schema.choices(field), None);
        Ok(self.open(field, SessionMode::Create, form))
    }

    pub fn open_edit(&mut self, field: &str) -> Result<&EditSession, PanelError> {
        let filter = self.existing(field)?;
        let form = EditForm::new(filter.field_type(), self.schema.choices(field), Some(&filter));
        Ok(self.open(field, SessionMode::Update, form))
    }

    fn open(&mut self, field: &str, mode: SessionMode, form: EditForm) -> &EditSession {
        self.session.insert(EditSession {
            field: field.to_string(),
            display_name: self.schema.display_name(field),
            mode,
            form,
            state: SessionState::Editing,
            error: None,
        })
    }

    /// Form of the open session, for operator/value edits
    pub fn form_mut(&mut self) -> Result<&mut EditForm, PanelError> {
        match self.session.as_mut() {
            Some(session) if session.state == SessionState::Editing => Ok(&mut session.form),
            Some(_) => Err(PanelError::Busy),
            None => Err(PanelError::NoSession),
        }
    }

    pub fn cancel(&mut self) {
        self.session = None;
    }

    /// Direct true/false action of a boolean form
    pub async fn submit_boolean(&mut self, value: bool) -> Result<(), PanelError> {
        let session = self.session.as_ref().ok_or(PanelError::NoSession)?;
        if session.form.field_type() != FieldType::Boolean {
            return Err(PanelError::WrongForm {
                action: "true/false",
                field_type: session.form.field_type(),
            });
        }
        let filter = Filter::new(session.field.clone(), FieldType::Boolean, Operator::Exact, FilterValue::Bool(value))?;
        self.submit_filter(filter).await
    }

    /// Validate the open form and send it
    pub async fn submit(&mut self) -> Result<(), PanelError> {
        let session = self.session.as_mut().ok_or(PanelError::NoSession)?;
        if session.state == SessionState::Submitting {
            return Err(PanelError::Busy);
        }
        if session.form.field_type() == FieldType::Boolean {
            return Err(PanelError::WrongForm {
                action: "submit",
                field_type: FieldType::Boolean,
            });
        }

        let built = Filter::new(
            session.field.clone(),
            session.form.field_type(),
            session.form.operator(),
            session.form.value(),
        );
        match built {
            Ok(filter) => self.submit_filter(filter).await,
            Err(err) => {
                session.error = Some(InlineError::from_filter(&err));
                Err(err.into())
            }
        }
    }

    async fn submit_filter(&mut self, filter: Filter) -> Result<(), PanelError> {
        let session = self.session.as_mut().ok_or(PanelError::NoSession)?;
        if session.state == SessionState::Submitting {
            return Err(PanelError::Busy);
        }
        session.state = SessionState::Submitting;
        session.error = None;
        let mode = session.mode;

        let result = match mode {
            SessionMode::Create => self.store.create(&filter).await,
            SessionMode::Update => {
                self.store
                    .update(filter.field(), &FilterPatch::from_filter(&filter))
                    .await
            }
        };

        match result {
            Ok(()) => {
                info!(field = filter.field(), "filter saved");
                self.session = None;
                self.after_mutation().await;
                Ok(())
            }
            Err(err) => {
                warn!(field = filter.field(), error = %err, "filter rejected");
                if let Some(session) = self.session.as_mut() {
                    session.state = SessionState::Editing;
                    session.error = Some(InlineError::from_gateway(&err));
                }
                Err(err.into())
            }
        }
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            filters: self
                .active
                .iter()
                .map(|filter| FilterSummary {
                    field: filter.field().to_string(),
                    display_name: self.schema.display_name(filter.field()),
                    field_type: filter.field_type(),
                    operator: filter.operator(),
                    text: filter.summary(),
                })
                .collect(),
            add_options: self.schema.add_filter_options(&self.active),
            session: self.session.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MockGateway, Mutation};
    use crate::registry::ModuleId;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    const FILTERS: &str = "/api/filter/";
    const SCHEMA: &str = "/api/result/schema/";

    struct ReloadLog {
        id: ModuleId,
        calls: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl ListingModule for ReloadLog {
        fn id(&self) -> &ModuleId {
            &self.id
        }

        async fn reload(&self, scroll_to_top: bool) {
            self.calls.lock().unwrap().push(scroll_to_top);
        }
    }

    fn setup() -> (MockGateway, Arc<ReloadLog>, FilterPanelController) {
        let gateway = MockGateway::new();
        gateway.respond_json(
            SCHEMA,
            json!({"fields": {
                "value": {"display_name": "Value", "type": "integer", "filtering": true},
                "enabled": {"display_name": "Enabled", "type": "boolean", "filtering": true},
                "branch": {"display_name": "Branch", "type": "list", "filtering": true,
                           "valid_choices": ["default", "trunk"]},
                "name": {"display_name": "Name", "type": "string", "filtering": true},
                "date": {"display_name": "Date", "type": "datetime", "filtering": true}
            }}),
        );
        gateway.respond_json(
            FILTERS,
            json!({"objects": [{"field": "value", "type": "integer", "operator": "gt", "value": 3}]}),
        );
        let store = Arc::new(FilterStore::new(Arc::new(gateway.clone()), FILTERS).with_schema(SCHEMA));
        let log = Arc::new(ReloadLog {
            id: ModuleId::new("results"),
            calls: Mutex::new(Vec::new()),
        });
        let panel = FilterPanelController::new(store, log.clone());
        (gateway, log, panel)
    }

    fn mutations(gateway: &MockGateway) -> usize {
        gateway.requests().iter().filter(|r| r.method != "GET").count()
    }

    #[tokio::test]
    async fn test_load_and_snapshot() {
        let (_gateway, _log, mut panel) = setup();
        panel.load().await.unwrap();

        let snapshot = panel.snapshot();
        assert_eq!(snapshot.filters.len(), 1);
        assert_eq!(snapshot.filters[0].display_name, "Value");
        assert_eq!(snapshot.filters[0].text, "> 3");

        let value = snapshot.add_options.iter().find(|o| o.name == "value").unwrap();
        assert!(!value.enabled);
        assert!(snapshot.session.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_filter_refused_before_any_request() {
        let (gateway, _log, mut panel) = setup();
        panel.load().await.unwrap();
        gateway.clear_requests();

        let err = panel.open_create("value").unwrap_err();
        assert_eq!(err, PanelError::Filter(FilterError::DuplicateField("value".to_string())));
        assert!(panel.session().is_none());
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_integer_range_and_reload_without_scroll() {
        let (gateway, log, mut panel) = setup();
        gateway.respond_json(FILTERS, json!({"objects": []}));
        gateway.respond_mutation(Mutation::Post, FILTERS, Ok(json!({})));
        panel.load().await.unwrap();

        panel.open_create("value").unwrap();
        let form = panel.form_mut().unwrap();
        form.select_operator(Operator::Range).unwrap();
        *form.text_mut(Bound::Low).unwrap() = "10".to_string();
        *form.text_mut(Bound::High).unwrap() = "20".to_string();
        panel.submit().await.unwrap();

        assert!(panel.session().is_none());
        assert_eq!(*log.calls.lock().unwrap(), vec![false]);
        let post = gateway.requests().into_iter().find(|r| r.method == "POST").unwrap();
        assert_eq!(
            post.body,
            Some(json!({"field": "value", "type": "integer", "operator": "range", "value": [10, 20]}))
        );
    }

    #[tokio::test]
    async fn test_local_validation_keeps_session_open() {
        let (gateway, log, mut panel) = setup();
        panel.load().await.unwrap();

        panel.open_create("date").unwrap();
        *panel.form_mut().unwrap().text_mut(Bound::Low).unwrap() = "31/01/2024".to_string();
        let err = panel.submit().await.unwrap_err();

        assert!(matches!(err, PanelError::Filter(FilterError::InvalidValue { .. })));
        let session = panel.session().unwrap();
        assert_eq!(session.state, SessionState::Editing);
        assert_eq!(session.error.as_ref().unwrap().control.as_deref(), Some("value"));
        assert_eq!(mutations(&gateway), 0);
        assert!(log.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_rejection_shown_inline() {
        let (gateway, log, mut panel) = setup();
        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), "Too many results.".to_string());
        gateway.respond_mutation(Mutation::Post, FILTERS, Err(GatewayError::Validation(fields)));
        panel.load().await.unwrap();

        panel.open_create("name").unwrap();
        *panel.form_mut().unwrap().text_mut(Bound::Low).unwrap() = "py".to_string();
        let err = panel.submit().await.unwrap_err();

        assert!(matches!(err, PanelError::Gateway(GatewayError::Validation(_))));
        let session = panel.session().unwrap();
        assert_eq!(session.state, SessionState::Editing);
        assert_eq!(
            session.error,
            Some(InlineError {
                control: Some("value".to_string()),
                message: "Too many results.".to_string(),
            })
        );
        assert!(log.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_boolean_form_uses_direct_actions() {
        let (gateway, _log, mut panel) = setup();
        gateway.respond_mutation(Mutation::Post, FILTERS, Ok(Value::Null));
        panel.load().await.unwrap();

        panel.open_create("enabled").unwrap();
        assert!(panel.form_mut().unwrap().operator_choices().is_empty());
        assert!(matches!(panel.submit().await, Err(PanelError::WrongForm { .. })));

        panel.submit_boolean(false).await.unwrap();
        let post = gateway.requests().into_iter().find(|r| r.method == "POST").unwrap();
        assert_eq!(post.body.unwrap()["value"], json!(false));
    }

    #[tokio::test]
    async fn test_list_form_prefills_first_choice() {
        let (_gateway, _log, mut panel) = setup();
        panel.load().await.unwrap();

        panel.open_create("branch").unwrap();
        let form = panel.form_mut().unwrap();
        assert_eq!(form.value(), FilterValue::scalar("default"));
        form.cycle_choice(true);
        assert_eq!(form.value(), FilterValue::scalar("trunk"));
        assert!(form.select_choice("nightly").is_err());
    }

    #[test]
    fn test_range_swap_is_local_ui_state() {
        let mut form = EditForm::new(FieldType::DateTime, Vec::new(), None);
        assert_eq!(form.operator(), Operator::Gte);
        *form.text_mut(Bound::Low).unwrap() = "2024-01-01".to_string();

        form.select_operator(Operator::Range).unwrap();
        assert_eq!(
            form,
            EditForm::DateTime {
                operator: Operator::Range,
                input: ValueInput::Bounds {
                    low: "2024-01-01".to_string(),
                    high: String::new(),
                },
            }
        );

        form.select_operator(Operator::Lte).unwrap();
        assert_eq!(form.value(), FilterValue::scalar("2024-01-01"));

        assert!(form.select_operator(Operator::IContains).is_err());
        assert_eq!(form.operator(), Operator::Lte);
    }

    #[test]
    fn test_cycle_operator_wraps() {
        let mut form = EditForm::new(FieldType::String, Vec::new(), None);
        form.cycle_operator(false);
        assert_eq!(form.operator(), Operator::IsNull);
        assert_eq!(form.value(), FilterValue::Empty);
        form.cycle_operator(true);
        assert_eq!(form.operator(), Operator::IContains);
    }

    #[tokio::test]
    async fn test_edit_prefills_existing_filter() {
        let (_gateway, _log, mut panel) = setup();
        panel.load().await.unwrap();

        let session = panel.open_edit("value").unwrap();
        assert_eq!(session.mode, SessionMode::Update);
        assert_eq!(
            session.form,
            EditForm::Integer {
                operator: Operator::Gt,
                input: ValueInput::Single("3".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_change_operator_and_remove() {
        let (gateway, log, mut panel) = setup();
        gateway.respond_mutation(Mutation::Patch, "/api/filter/value/", Ok(Value::Null));
        gateway.respond_mutation(Mutation::Delete, "/api/filter/value/", Ok(Value::Null));
        panel.load().await.unwrap();

        panel.change_operator("value", Operator::Range).await.unwrap();
        let patch = gateway.requests().into_iter().find(|r| r.method == "PATCH").unwrap();
        assert_eq!(patch.body, Some(json!({"operator": "range", "value": [3, 3]})));

        let err = panel.change_operator("value", Operator::Year).await.unwrap_err();
        assert!(matches!(err, PanelError::Filter(FilterError::InvalidOperator { .. })));

        panel.remove("value").await.unwrap();
        assert_eq!(*log.calls.lock().unwrap(), vec![false, false]);

        assert!(matches!(
            panel.remove("missing").await,
            Err(PanelError::Filter(FilterError::UnknownField(_)))
        ));
    }

    #[tokio::test]
    async fn test_set_value_sends_only_value() {
        let (gateway, _log, mut panel) = setup();
        gateway.respond_mutation(Mutation::Patch, "/api/filter/value/", Ok(Value::Null));
        panel.load().await.unwrap();

        panel.set_value("value", FilterValue::scalar("9")).await.unwrap();
        let patch = gateway.requests().into_iter().find(|r| r.method == "PATCH").unwrap();
        assert_eq!(patch.body, Some(json!({"value": 9})));

        let err = panel.set_value("value", FilterValue::scalar("nine")).await.unwrap_err();
        assert!(matches!(err, PanelError::Filter(FilterError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn test_not_filterable_field_refused() {
        let (_gateway, _log, mut panel) = setup();
        panel.load().await.unwrap();
        assert_eq!(
            panel.open_create("resource_uri").unwrap_err(),
            PanelError::Filter(FilterError::NotFilterable("resource_uri".to_string()))
        );
    }
}
