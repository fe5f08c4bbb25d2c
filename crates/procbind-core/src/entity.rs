//! Attribute metadata for entities and filters
//!
//! An entity or filter type describes its database-bound attributes once,
//! through [`Bindable::metadata`]. Each [`FieldBinding`] pairs a field
//! accessor with a logical parameter name, a direction and an optional SQL
//! type. Attributes without a binding are invisible to the data layer.
//!
//! # Example
//!
//! ```
//! use procbind_core::{AttributeMetadata, Bindable, FieldBinding, ParamDirection};
//!
//! #[derive(Default)]
//! struct Customer {
//!     id: Option<i32>,
//!     name: String,
//! }
//!
//! impl Bindable for Customer {
//!     fn metadata() -> AttributeMetadata<Self> {
//!         AttributeMetadata::new()
//!             .field(
//!                 FieldBinding::mapped("Id", |c: &Customer| c.id, |c, v| c.id = v)
//!                     .with_direction(ParamDirection::Out)
//!                     .with_sql_type(procbind_core::SqlType::Integer),
//!             )
//!             .field(FieldBinding::mapped(
//!                 "Name",
//!                 |c: &Customer| c.name.clone(),
//!                 |c, v| c.name = v,
//!             ))
//!     }
//! }
//!
//! assert_eq!(Customer::metadata().len(), 2);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{FromValue, ProcbindError, Result, Row, SqlType, Value};

/// Direction of a procedure parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParamDirection {
    /// Flows into the procedure
    #[default]
    In,
    /// Flows out of the procedure
    Out,
    /// Flows both ways
    InOut,
}

impl ParamDirection {
    /// Whether a value must be bound before execution
    pub fn is_input(self) -> bool {
        matches!(self, ParamDirection::In | ParamDirection::InOut)
    }

    /// Whether an output registration is required
    pub fn is_output(self) -> bool {
        matches!(self, ParamDirection::Out | ParamDirection::InOut)
    }
}

impl fmt::Display for ParamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamDirection::In => f.write_str("IN"),
            ParamDirection::Out => f.write_str("OUT"),
            ParamDirection::InOut => f.write_str("INOUT"),
        }
    }
}

type Getter<T> = Arc<dyn Fn(&T) -> Result<Value> + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// Binding of one attribute of `T` to a procedure parameter
pub struct FieldBinding<T> {
    field: Cow<'static, str>,
    tag: Cow<'static, str>,
    direction: ParamDirection,
    sql_type: Option<SqlType>,
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

impl<T> Clone for FieldBinding<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            tag: self.tag.clone(),
            direction: self.direction,
            sql_type: self.sql_type,
            getter: Arc::clone(&self.getter),
            setter: self.setter.clone(),
        }
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("field", &self.field)
            .field("tag", &self.tag)
            .field("direction", &self.direction)
            .field("sql_type", &self.sql_type)
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

impl<T: 'static> FieldBinding<T> {
    /// Bind a field through an infallible getter
    pub fn new(
        field: &'static str,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::try_new(field, move |owner| Ok(get(owner)))
    }

    /// Bind a field through a getter that may fail with an access error
    pub fn try_new(
        field: &'static str,
        get: impl Fn(&T) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: Cow::Borrowed(field),
            tag: Cow::Borrowed(""),
            direction: ParamDirection::In,
            sql_type: None,
            getter: Arc::new(get),
            setter: None,
        }
    }

    /// Bind a field through a typed getter/setter pair
    pub fn mapped<V>(
        field: &'static str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: Into<Value> + FromValue + 'static,
    {
        Self::new(field, move |owner| get(owner).into()).with_setter(move |owner, value| {
            set(owner, V::from_value(value)?);
            Ok(())
        })
    }

    /// Set the logical parameter name; blank names fall back to the field identifier
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.tag = name.into();
        self
    }

    pub fn with_direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Declare the SQL type explicitly; `Unspecified` clears the declaration
    pub fn with_sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = Some(sql_type).filter(|t| t.is_specified());
        self
    }

    /// Declare the SQL type by integer code; `-1` and unknown codes are ignored
    pub fn with_sql_type_code(mut self, code: i32) -> Self {
        self.sql_type = SqlType::from_code(code);
        self
    }

    /// Setter used when rehydrating from a row or applying output values
    pub fn with_setter(
        mut self,
        set: impl Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(set));
        self
    }
}

impl<T> FieldBinding<T> {
    /// The attribute's own identifier
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The raw logical-name tag, as declared
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Parameter name: the trimmed tag, or the field identifier when the tag is blank
    pub fn resolved_name(&self) -> &str {
        let trimmed = self.tag.trim();
        if trimmed.is_empty() {
            &*self.field
        } else {
            trimmed
        }
    }

    pub fn direction(&self) -> ParamDirection {
        self.direction
    }

    /// Explicitly declared SQL type, if any
    pub fn sql_type(&self) -> Option<SqlType> {
        self.sql_type
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the attribute value from its owner
    pub fn read(&self, owner: &T) -> Result<Value> {
        (self.getter)(owner)
    }

    /// Write a value into the attribute
    pub fn write(&self, owner: &mut T, value: Value) -> Result<()> {
        match &self.setter {
            Some(set) => set(owner, value),
            None => Err(ProcbindError::Access(format!(
                "attribute {} has no setter",
                self.field
            ))),
        }
    }
}

/// Ordered attribute bindings declared by one entity or filter type
pub struct AttributeMetadata<T> {
    entity_name: Option<Cow<'static, str>>,
    fields: Vec<FieldBinding<T>>,
}

impl<T> Clone for AttributeMetadata<T> {
    fn clone(&self) -> Self {
        Self {
            entity_name: self.entity_name.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl<T> fmt::Debug for AttributeMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMetadata")
            .field("entity_name", &self.entity_name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<T> Default for AttributeMetadata<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AttributeMetadata<T> {
    /// Empty metadata; a type that returns this has no bound attributes
    pub fn new() -> Self {
        Self {
            entity_name: None,
            fields: Vec::new(),
        }
    }

    /// Name of the entity on the database side
    pub fn with_entity_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    /// Append a field binding (declaration order is binding order)
    pub fn field(mut self, binding: FieldBinding<T>) -> Self {
        self.fields.push(binding);
        self
    }

    pub fn fields(&self) -> &[FieldBinding<T>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find a binding by resolved parameter name
    pub fn find(&self, name: &str) -> Option<&FieldBinding<T>> {
        self.fields.iter().find(|f| f.resolved_name() == name)
    }

    /// Declared entity name, or the unqualified type name
    pub fn entity_name(&self) -> Cow<'static, str> {
        match &self.entity_name {
            Some(name) if !name.trim().is_empty() => Cow::Owned(name.trim().to_string()),
            _ => Cow::Borrowed(short_type_name::<T>()),
        }
    }

    /// Check that every binding yields a usable parameter name
    pub fn validate(&self) -> Result<()> {
        for (idx, binding) in self.fields.iter().enumerate() {
            if binding.resolved_name().trim().is_empty() {
                return Err(ProcbindError::Argument(format!(
                    "binding #{} of {} has neither a name nor a field identifier",
                    idx,
                    self.entity_name()
                )));
            }
        }
        Ok(())
    }

    /// Render `field:value` pairs for diagnostics
    pub fn describe(&self, owner: &T) -> String {
        self.fields
            .iter()
            .map(|binding| match binding.read(owner) {
                Ok(value) => format!("{}:{}", binding.field(), value),
                Err(_) => format!("{}:<unreadable>", binding.field()),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A type whose attributes can be bound to procedure parameters
pub trait Bindable: Sized {
    /// Attribute metadata, in declaration order
    fn metadata() -> AttributeMetadata<Self>;
}

/// Turns one result row into one entity
pub trait ResultMapper: Sized {
    fn map_one(row: &Row) -> Result<Self>;
}

/// Rehydrate an entity from a row through its metadata setters
///
/// Each writable binding reads the column named by its resolved name. A
/// column absent from the row is written as NULL, so non-nullable attributes
/// surface a mapping error while optional ones become `None`.
pub fn map_by_metadata<E: Bindable + Default>(row: &Row) -> Result<E> {
    let metadata = E::metadata();
    let mut entity = E::default();
    for binding in metadata.fields().iter().filter(|b| b.is_writable()) {
        let name = binding.resolved_name();
        let value = row.get_by_name(name).cloned().unwrap_or(Value::Null);
        binding.write(&mut entity, value).map_err(|e| {
            ProcbindError::Mapping(format!(
                "{}.{}: {}",
                metadata.entity_name(),
                name,
                e.cause()
            ))
        })?;
    }
    Ok(entity)
}

/// Ordered, duplicate-permitting list of entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityList<E>(Vec<E>);

impl<E> EntityList<E> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, entity: E) {
        self.0.push(entity);
    }

    pub fn into_vec(self) -> Vec<E> {
        self.0
    }
}

impl<E> Default for EntityList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Deref for EntityList<E> {
    type Target = [E];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E> From<Vec<E>> for EntityList<E> {
    fn from(entities: Vec<E>) -> Self {
        Self(entities)
    }
}

impl<E> FromIterator<E> for EntityList<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<E> IntoIterator for EntityList<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a EntityList<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
