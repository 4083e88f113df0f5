use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::{Decimal, Uuid};

/// Values a field type can be bound as.
pub trait SqlValue: Sized {
    fn into_value(value: Option<Self>) -> Value;
}

macro_rules! values {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// A typed, possibly null bind value. Nulls keep their type so the
        /// server sees the same parameter type whatever the field state.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Value {
            $($variant(Option<$ty>),)*
        }

        impl Value {
            pub fn is_null(&self) -> bool {
                match self {
                    $(Value::$variant(value) => value.is_none(),)*
                }
            }
        }

        $(
            impl SqlValue for $ty {
                fn into_value(value: Option<Self>) -> Value {
                    Value::$variant(value)
                }
            }
        )*
    };
}

values! {
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(JsonValue),
    Bytes(Vec<u8>),
    BoolArray(Vec<bool>),
    SmallIntArray(Vec<i16>),
    IntArray(Vec<i32>),
    BigIntArray(Vec<i64>),
    RealArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    DecimalArray(Vec<Decimal>),
    TextArray(Vec<String>),
    UuidArray(Vec<Uuid>),
    TimestampArray(Vec<NaiveDateTime>),
    TimestampTzArray(Vec<DateTime<Utc>>),
    DateArray(Vec<NaiveDate>),
    TimeArray(Vec<NaiveTime>),
    JsonArray(Vec<JsonValue>),
    BytesArray(Vec<Vec<u8>>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Some(value.to_string()))
    }
}
