//! State declarations.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::store::State;
use crate::error::StateError;
use crate::events::{Args, CallingConvention, Handler, HandlerResult, Reply, SETTER_PREFIX};

type ComputedFn = Arc<dyn Fn(&State) -> Value + Send + Sync>;
type MethodFn = Arc<dyn Fn(&mut State, &Args) -> HandlerResult + Send + Sync>;

/// The JSON shape a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Any,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl FieldKind {
    /// Kind of a value. `null` maps to [`FieldKind::Any`].
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => FieldKind::Any,
            Value::Bool(_) => FieldKind::Bool,
            Value::Number(_) => FieldKind::Number,
            Value::String(_) => FieldKind::String,
            Value::Array(_) => FieldKind::Array,
            Value::Object(_) => FieldKind::Object,
        }
    }

    /// Whether a field of this kind can hold `value`. `null` always fits.
    pub fn accepts(self, value: &Value) -> bool {
        self == FieldKind::Any || value.is_null() || FieldKind::of(value) == self
    }

    /// Best-effort conversion of a client string into this kind.
    ///
    /// Form controls always report strings, so setters run their value
    /// through here before storing it.
    pub fn coerce(self, value: Value) -> Value {
        let Value::String(text) = &value else {
            return value;
        };
        match self {
            FieldKind::Number => {
                let trimmed = text.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    Value::from(n)
                } else if let Some(n) = trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                {
                    Value::Number(n)
                } else {
                    value
                }
            }
            FieldKind::Bool => match text.as_str() {
                "true" | "on" | "1" => Value::Bool(true),
                "false" | "off" | "0" | "" => Value::Bool(false),
                _ => value,
            },
            _ => value,
        }
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub default: Value,
    pub kind: FieldKind,
}

#[derive(Clone)]
struct Method {
    f: MethodFn,
    params: Vec<String>,
    background: bool,
}

/// Declaration of a state type.
pub struct StateSchema {
    name: String,
    fields: IndexMap<String, FieldDef>,
    computed: IndexMap<String, ComputedFn>,
    methods: IndexMap<String, Method>,
}

impl StateSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            computed: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// Declare a field. Its kind is taken from the default value.
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        let name = name.into();
        let default = default.into();
        let kind = FieldKind::of(&default);
        self.fields.insert(
            name.clone(),
            FieldDef {
                name,
                default,
                kind,
            },
        );
        self
    }

    /// Declare a read-only field derived from the others on every read.
    pub fn computed<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&State) -> Value + Send + Sync + 'static,
    {
        self.computed.insert(name.into(), Arc::new(f));
        self
    }

    /// Declare a handler method that takes no named arguments.
    pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut State, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        self.method_with(name, Vec::<String>::new(), f)
    }

    /// Declare a handler method bound to the given payload parameters.
    pub fn method_with<I, S, F>(mut self, name: impl Into<String>, params: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&mut State, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        self.methods.insert(
            name.into(),
            Method {
                f: Arc::new(f),
                params: params.into_iter().map(Into::into).collect(),
                background: false,
            },
        );
        self
    }

    /// Run the most recently declared method on the background pool.
    pub fn in_background(mut self) -> Self {
        if let Some((_, method)) = self.methods.last_mut() {
            method.background = true;
        }
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.computed.contains_key(name)
    }

    pub fn computed_names(&self) -> impl Iterator<Item = &str> {
        self.computed.keys().map(String::as_str)
    }

    pub(crate) fn compute(&self, name: &str, state: &State) -> Option<Value> {
        self.computed.get(name).map(|f| f(state))
    }

    /// Every handler this schema provides: declared methods, then a
    /// `set_<field>` setter for each field without a method of that name.
    pub fn handlers(self: &Arc<Self>) -> Vec<Handler> {
        let methods = self
            .methods
            .iter()
            .map(|(name, method)| self.method_handler(name, method));
        let setters = self
            .fields
            .keys()
            .filter(|field| !self.methods.contains_key(&setter_name(field)))
            .map(|field| self.setter_handler(field));
        methods.chain(setters).collect()
    }

    /// Look up one handler by method or setter name.
    pub fn handler(self: &Arc<Self>, name: &str) -> Result<Handler, StateError> {
        if let Some(method) = self.methods.get(name) {
            return Ok(self.method_handler(name, method));
        }
        name.strip_prefix(SETTER_PREFIX)
            .filter(|field| self.fields.contains_key(*field))
            .map(|field| self.setter_handler(field))
            .ok_or_else(|| StateError::UnknownHandler {
                state: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// The setter for `field`.
    pub fn setter(self: &Arc<Self>, field: &str) -> Result<Handler, StateError> {
        if !self.fields.contains_key(field) {
            return Err(self.unknown_field(field));
        }
        self.handler(&setter_name(field))
    }

    pub(crate) fn unknown_field(&self, field: &str) -> StateError {
        StateError::UnknownField {
            state: self.name.clone(),
            field: field.to_string(),
        }
    }

    /// Handler id for one of this schema's methods: `<State>.<method>`.
    pub fn qualify(&self, method: &str) -> String {
        format!("{}.{}", self.name, method)
    }

    fn method_handler(self: &Arc<Self>, name: &str, method: &Method) -> Handler {
        let schema = Arc::clone(self);
        let f = Arc::clone(&method.f);
        let handler = Handler::new(self.qualify(name), move |inv| {
            inv.state()
                .with_instance(&schema, |state| f(state, inv.args()))
        })
        .params(method.params.iter().cloned())
        .owned_by(self.name.clone());

        if method.background {
            handler.background()
        } else {
            handler
        }
    }

    fn setter_handler(self: &Arc<Self>, field: &str) -> Handler {
        let schema = Arc::clone(self);
        let target = field.to_string();
        Handler::new(self.qualify(&setter_name(field)), move |inv| {
            let value = inv.args().raw().cloned().unwrap_or(Value::Null);
            inv.state().with_instance(&schema, |state| {
                let kind = state
                    .schema()
                    .field_def(&target)
                    .map_or(FieldKind::Any, |def| def.kind);
                state.set(&target, kind.coerce(value))
            })?;
            Ok(Reply::None)
        })
        .owned_by(self.name.clone())
        .with_convention(CallingConvention::RawValue)
    }
}

fn setter_name(field: &str) -> String {
    format!("{SETTER_PREFIX}{field}")
}

impl fmt::Debug for StateSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSchema")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
