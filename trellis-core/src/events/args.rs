//! Argument binding.
//!
//! A handler declares the parameter names it wants. At invocation time each
//! declared name is looked up in the event payload; a parameter named `data`
//! that is not itself a payload key receives the whole payload. Setter-style
//! handlers skip all of this and receive the raw client value.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::handler::CallingConvention;
use crate::error::HandlerError;

/// Parameter name that receives the entire payload.
pub const DATA_PARAM: &str = "data";

/// The client-supplied part of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    /// Structured event data, usually an object.
    pub data: Value,

    /// Raw value sent by setter bindings.
    pub value: Option<Value>,
}

impl Payload {
    pub fn new(data: Value) -> Self {
        Self { data, value: None }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Arguments bound for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    named: IndexMap<String, Value>,
    raw: Option<Value>,
}

impl Args {
    /// Bind a payload against a handler's declared parameters.
    pub fn bind(params: &[String], convention: CallingConvention, payload: &Payload) -> Self {
        match convention {
            CallingConvention::RawValue => {
                let raw = payload
                    .value
                    .clone()
                    .or_else(|| (!payload.data.is_null()).then(|| payload.data.clone()))
                    .unwrap_or(Value::Null);
                Self::from_raw(raw)
            }
            CallingConvention::GenericPayload => {
                let mut named = IndexMap::new();
                match &payload.data {
                    Value::Null => {}
                    Value::Object(map) => {
                        for param in params {
                            if let Some(value) = map.get(param) {
                                named.insert(param.clone(), value.clone());
                            } else if param == DATA_PARAM {
                                named.insert(param.clone(), payload.data.clone());
                            }
                        }
                    }
                    other => {
                        if params.iter().any(|p| p == DATA_PARAM) {
                            named.insert(DATA_PARAM.to_string(), other.clone());
                        }
                    }
                }
                Self { named, raw: None }
            }
        }
    }

    /// Build named arguments directly.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            named: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            raw: None,
        }
    }

    /// Build a raw-value argument directly.
    pub fn from_raw(value: Value) -> Self {
        Self {
            named: IndexMap::new(),
            raw: Some(value),
        }
    }

    /// Get a named argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Get and convert a named argument, failing if it is absent.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, HandlerError> {
        let value = self
            .named
            .get(name)
            .ok_or_else(|| HandlerError::MissingArgument(name.to_string()))?;
        convert(name, value)
    }

    /// Get and convert a named argument if present.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, HandlerError> {
        self.named.get(name).map(|v| convert(name, v)).transpose()
    }

    /// The whole payload, when the handler declared a `data` parameter.
    pub fn data(&self) -> Option<&Value> {
        self.named.get(DATA_PARAM)
    }

    /// The raw value passed to setter-style handlers.
    pub fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }

    pub fn raw_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let value = self
            .raw
            .as_ref()
            .ok_or_else(|| HandlerError::MissingArgument("value".to_string()))?;
        convert("value", value)
    }

    /// Names of the bound arguments, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.raw.is_none()
    }
}

fn convert<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, HandlerError> {
    T::deserialize(value).map_err(|source| HandlerError::InvalidArgument {
        name: name.to_string(),
        source,
    })
}
