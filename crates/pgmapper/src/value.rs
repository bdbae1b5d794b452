//! Dynamic column values and fetched records.
//!
//! Rows come back from the backend as ordered `column -> Value` maps. The same
//! [`Value`] type is used for binding, so a value read from one row can be fed
//! straight back into a `where_` condition or an insert.

use crate::error::{OrmError, OrmResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Format, IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A single column value.
///
/// Binding picks the native binary encoding when the parameter type inferred
/// by the server matches the variant, and falls back to the text encoding
/// otherwise, letting the server parse it (e.g. `Text("2024-01-01")` bound to a
/// `timestamptz` parameter).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// JSON documents, and one-dimensional arrays read from array columns
    Json(serde_json::Value),
}

impl Value {
    /// Current instant, as stamped into `created_at` / `updated_at` / `deleted_at`.
    pub fn now() -> Self {
        Value::Timestamp(Utc::now())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    /// Whether `to_sql` writes the binary wire format for this parameter type.
    fn binary_for(&self, ty: &Type) -> bool {
        match self {
            Value::Null | Value::Bytes(_) => true,
            Value::Bool(_) => *ty == Type::BOOL,
            Value::Int(_) => matches!(
                *ty,
                Type::INT2 | Type::INT4 | Type::INT8 | Type::FLOAT4 | Type::FLOAT8
            ),
            Value::Float(_) => matches!(*ty, Type::FLOAT4 | Type::FLOAT8),
            Value::Decimal(_) => *ty == Type::NUMERIC,
            Value::Text(_) => false,
            Value::Uuid(_) => *ty == Type::UUID,
            Value::Timestamp(_) => matches!(*ty, Type::TIMESTAMPTZ | Type::TIMESTAMP | Type::DATE),
            Value::Date(_) => *ty == Type::DATE,
            Value::Time(_) => *ty == Type::TIME,
            Value::Json(_) => matches!(*ty, Type::JSON | Type::JSONB),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => {
                f.write_str("\\x")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Timestamp(v) => f.write_str(&v.to_rfc3339()),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "{v}"),
        }
    }
}

fn write_text(value: &Value, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match value {
        Value::Json(serde_json::Value::Array(items)) if matches!(ty.kind(), Kind::Array(_)) => {
            out.extend_from_slice(array_literal(items).as_bytes());
        }
        _ => out.extend_from_slice(value.to_string().as_bytes()),
    }
    Ok(IsNull::No)
}

/// Render a JSON array as a one-dimensional array literal, e.g. `{"a",NULL,"b c"}`.
fn array_literal(items: &[serde_json::Value]) -> String {
    let elements: Vec<String> = items
        .iter()
        .map(|item| match item {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(v) => v.to_string(),
            serde_json::Value::Number(v) => v.to_string(),
            serde_json::Value::String(v) => quote_element(v),
            other => quote_element(&other.to_string()),
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}

fn quote_element(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if !self.binary_for(ty) {
            return write_text(self, ty, out);
        }
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Decimal(v) => v.to_sql(ty, out),
            Value::Bytes(v) => {
                out.extend_from_slice(v);
                Ok(IsNull::No)
            }
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                Type::DATE => v.date_naive().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            Value::Text(_) => write_text(self, ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    fn encode_format(&self, ty: &Type) -> Format {
        if self.binary_for(ty) {
            Format::Binary
        } else {
            Format::Text
        }
    }

    to_sql_checked!();
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    NaiveTime => Time,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v.and_utc())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Relation data attached to a [`Record`] by relation loaders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Related {
    /// `has_one` / `belongs_to`
    One(Option<Box<Record>>),
    /// `has_many` / `belongs_to_many`
    Many(Vec<Record>),
}

impl Related {
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Related::One(r) => r.as_deref(),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> &[Record] {
        match self {
            Related::Many(rows) => rows,
            Related::One(_) => &[],
        }
    }
}

/// One fetched row: ordered column values plus any loaded relations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    columns: IndexMap<String, Value>,
    #[serde(flatten)]
    relations: IndexMap<String, Related>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: IndexMap<String, Value>) -> Self {
        Self {
            columns,
            relations: IndexMap::new(),
        }
    }

    /// Column value, if the row has that column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Column value, treating a missing column as `NULL`.
    pub fn value(&self, column: &str) -> Value {
        self.columns.get(column).cloned().unwrap_or_default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn columns(&self) -> &IndexMap<String, Value> {
        &self.columns
    }

    pub fn into_columns(self) -> IndexMap<String, Value> {
        self.columns
    }

    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> &IndexMap<String, Related> {
        &self.relations
    }

    pub fn set_relation(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_columns(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Enum labels arrive as plain UTF-8 in the binary protocol.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_owned()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

/// The undecoded wire bytes of a column whose type has no [`Value`] mapping.
struct RawColumn(Vec<u8>);

impl<'a> FromSql<'a> for RawColumn {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawColumn(raw.to_vec()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn decode_raw(row: &Row, idx: usize) -> Result<Value, String> {
    row.try_get::<_, Option<RawColumn>>(idx)
        .map(|v| v.map_or(Value::Null, |raw| Value::Bytes(raw.0)))
        .map_err(|e| e.to_string())
}

/// Decode a one-dimensional array into a JSON array.
///
/// Element types without a mapping, and arrays with more than one dimension,
/// come back as raw bytes.
fn decode_array(row: &Row, idx: usize, element: &Type) -> Result<Value, String> {
    macro_rules! get {
        ($t:ty) => {
            row.try_get::<_, Option<Vec<Option<$t>>>>(idx)
                .map_err(|e| e.to_string())
                .and_then(|items| match items {
                    None => Ok(Value::Null),
                    Some(items) => serde_json::to_value(items)
                        .map(Value::Json)
                        .map_err(|e| e.to_string()),
                })
        };
    }

    let decoded = match *element {
        Type::BOOL => get!(bool),
        Type::INT2 => get!(i16),
        Type::INT4 => get!(i32),
        Type::INT8 => get!(i64),
        Type::FLOAT4 => get!(f32),
        Type::FLOAT8 => get!(f64),
        Type::NUMERIC => get!(Decimal),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => get!(String),
        Type::UUID => get!(Uuid),
        Type::TIMESTAMPTZ => get!(DateTime<Utc>),
        Type::TIMESTAMP => get!(NaiveDateTime),
        Type::DATE => get!(NaiveDate),
        Type::TIME => get!(NaiveTime),
        Type::JSON | Type::JSONB => get!(serde_json::Value),
        _ => return decode_raw(row, idx),
    };
    decoded.or_else(|_| decode_raw(row, idx))
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<Value, String> {
    macro_rules! get {
        ($t:ty) => {
            row.try_get::<_, Option<$t>>(idx)
                .map(Value::from)
                .map_err(|e| e.to_string())
        };
    }

    match *ty {
        Type::BOOL => get!(bool),
        Type::INT2 => get!(i16),
        Type::INT4 => get!(i32),
        Type::INT8 => get!(i64),
        Type::OID => get!(u32),
        Type::FLOAT4 => get!(f32),
        Type::FLOAT8 => get!(f64),
        Type::NUMERIC => get!(Decimal),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => get!(String),
        Type::BYTEA => get!(Vec<u8>),
        Type::UUID => get!(Uuid),
        Type::TIMESTAMPTZ => get!(DateTime<Utc>),
        Type::TIMESTAMP => get!(NaiveDateTime),
        Type::DATE => get!(NaiveDate),
        Type::TIME => get!(NaiveTime),
        Type::JSON | Type::JSONB => get!(serde_json::Value),
        _ => match ty.kind() {
            Kind::Enum(_) => row
                .try_get::<_, Option<EnumLabel>>(idx)
                .map(|v| v.map_or(Value::Null, |label| Value::Text(label.0)))
                .map_err(|e| e.to_string()),
            Kind::Array(element) => decode_array(row, idx, element),
            _ => decode_raw(row, idx),
        },
    }
}

/// Decode a backend row into a [`Record`], inferring each value from its column type.
pub(crate) fn decode_row(row: &Row) -> OrmResult<Record> {
    let mut columns = IndexMap::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_())
            .map_err(|message| OrmError::decode(column.name(), message))?;
        columns.insert(column.name().to_owned(), value);
    }
    Ok(Record::from_columns(columns))
}
