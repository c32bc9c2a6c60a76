//! Live job instances, looked up by identifier when a job fires.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::declaration::simple_type_name;
use crate::error::{ConfigurationError, InvocationError, LookupError};

/// Error type entry points may return.
pub type EntryError = Box<dyn std::error::Error + Send + Sync>;

type EntryFn = Arc<dyn Fn() -> Result<Option<Value>, EntryError> + Send + Sync>;

/// Conversion of an entry point's return value into a run result.
///
/// `()` and JSON `null` mean "no result".
pub trait IntoRunValue {
    fn into_run_value(self) -> Option<Value>;
}

impl IntoRunValue for () {
    fn into_run_value(self) -> Option<Value> {
        None
    }
}

impl IntoRunValue for Value {
    fn into_run_value(self) -> Option<Value> {
        (!self.is_null()).then_some(self)
    }
}

impl<T: IntoRunValue> IntoRunValue for Option<T> {
    fn into_run_value(self) -> Option<Value> {
        self.and_then(IntoRunValue::into_run_value)
    }
}

macro_rules! run_value_via_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoRunValue for $t {
                fn into_run_value(self) -> Option<Value> {
                    Some(Value::from(self))
                }
            }
        )*
    };
}

run_value_via_from!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, &'static str);

/// One live business object and the entry points it exposes.
pub struct JobInstance {
    identifier: String,
    entry_points: HashMap<String, EntryFn>,
}

impl JobInstance {
    /// Start describing `instance`; its identifier is the simple name of `T`.
    pub fn of<T: Send + Sync + 'static>(instance: Arc<T>) -> InstanceBuilder<T> {
        InstanceBuilder {
            identifier: simple_type_name::<T>().to_string(),
            instance,
            entry_points: HashMap::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn has_entry_point(&self, name: &str) -> bool {
        self.entry_points.contains_key(name)
    }

    /// Call `entry_point` on the current thread and return its result value.
    ///
    /// Errors and panics from the entry point become [`InvocationError`].
    pub fn invoke(&self, entry_point: &str) -> Result<Option<Value>, InvocationError> {
        let f = self.entry_points.get(entry_point).ok_or_else(|| {
            InvocationError::MissingEntryPoint {
                identifier: self.identifier.clone(),
                entry_point: entry_point.to_string(),
            }
        })?;

        match panic::catch_unwind(AssertUnwindSafe(|| f())) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(InvocationError::Failed {
                identifier: self.identifier.clone(),
                entry_point: entry_point.to_string(),
                source,
            }),
            Err(payload) => Err(InvocationError::Panicked {
                identifier: self.identifier.clone(),
                entry_point: entry_point.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder returned by [`JobInstance::of`].
pub struct InstanceBuilder<T> {
    identifier: String,
    instance: Arc<T>,
    entry_points: HashMap<String, EntryFn>,
}

impl<T: Send + Sync + 'static> InstanceBuilder<T> {
    /// Register under an explicit identifier instead of the type name.
    pub fn named(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Expose an infallible method as entry point `name`.
    pub fn entry_point<F, R>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: IntoRunValue,
    {
        let instance = Arc::clone(&self.instance);
        self.entry_points.insert(
            name.to_string(),
            Arc::new(move || Ok(f(&instance).into_run_value())),
        );
        self
    }

    /// Expose a method returning `Result` as entry point `name`.
    pub fn fallible_entry_point<F, R, E>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
        R: IntoRunValue,
        E: Into<EntryError>,
    {
        let instance = Arc::clone(&self.instance);
        self.entry_points.insert(
            name.to_string(),
            Arc::new(move || {
                f(&instance)
                    .map(IntoRunValue::into_run_value)
                    .map_err(Into::into)
            }),
        );
        self
    }

    pub fn build(self) -> JobInstance {
        JobInstance {
            identifier: self.identifier,
            entry_points: self.entry_points,
        }
    }
}

impl<T: Send + Sync + 'static> From<InstanceBuilder<T>> for JobInstance {
    fn from(builder: InstanceBuilder<T>) -> Self {
        builder.build()
    }
}

/// Identifier → live instance map.
///
/// Filled once at bootstrap, then frozen behind an `Arc` and only read.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: HashMap<String, JobInstance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, instance: impl Into<JobInstance>) -> Result<(), ConfigurationError> {
        let instance = instance.into();
        if self.instances.contains_key(&instance.identifier) {
            return Err(ConfigurationError::DuplicateIdentifier {
                identifier: instance.identifier,
            });
        }
        self.instances.insert(instance.identifier.clone(), instance);
        Ok(())
    }

    pub fn resolve(&self, identifier: &str) -> Result<&JobInstance, LookupError> {
        self.instances
            .get(identifier)
            .ok_or_else(|| LookupError::NotRegistered {
                identifier: identifier.to_string(),
            })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.instances.contains_key(identifier)
    }
}
