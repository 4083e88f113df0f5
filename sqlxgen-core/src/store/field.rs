use sqlx::error::BoxDynError;
use sqlx::{Database, Decode, Type, ValueRef};

use super::value::{SqlValue, Value};

/// A column value that distinguishes "not provided" from "explicitly null".
///
/// Absent fields are left out of update sets and bind as typed nulls in
/// predicates, which makes them match any value there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Field<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

/// One field of an entity or query argument, ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub column: &'static str,
    pub present: bool,
    pub value: Value,
}

impl<T> Field<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Field::Value(value),
            None => Field::Null,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: SqlValue + Clone> Field<T> {
    pub fn bind(&self, column: &'static str) -> Binding {
        Binding {
            column,
            present: self.is_present(),
            value: T::into_value(self.value().cloned()),
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Value(value)
    }
}

impl<T, DB> Type<DB> for Field<T>
where
    T: Type<DB>,
    DB: Database,
{
    fn type_info() -> DB::TypeInfo {
        T::type_info()
    }

    fn compatible(ty: &DB::TypeInfo) -> bool {
        T::compatible(ty)
    }
}

impl<'r, T, DB> Decode<'r, DB> for Field<T>
where
    T: Decode<'r, DB>,
    DB: Database,
{
    fn decode(value: <DB as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        if value.is_null() {
            return Ok(Field::Null);
        }
        T::decode(value).map(Field::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_states_bind() {
        let absent: Field<i32> = Field::Absent;
        let null: Field<i32> = Field::Null;
        let value: Field<i32> = 7.into();

        assert_eq!(
            absent.bind("id"),
            Binding {
                column: "id",
                present: false,
                value: Value::Int(None)
            }
        );
        assert_eq!(
            null.bind("id"),
            Binding {
                column: "id",
                present: true,
                value: Value::Int(None)
            }
        );
        assert_eq!(
            value.bind("id"),
            Binding {
                column: "id",
                present: true,
                value: Value::Int(Some(7))
            }
        );
    }

    #[test]
    fn option_conversions() {
        assert_eq!(Field::from_option(Some("a")), Field::Value("a"));
        assert_eq!(Field::<&str>::from_option(None), Field::Null);
        assert_eq!(Field::Value(3).into_option(), Some(3));
        assert_eq!(Field::<i32>::Null.into_option(), None);
        assert!(Field::<i32>::default().is_absent());
    }
}
