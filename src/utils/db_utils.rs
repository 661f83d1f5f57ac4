use chrono::NaiveDate;
use serde_json::Value;
use sqlx::{
    MySql, MySqlConnection,
    mysql::MySqlArguments,
    query::QueryAs,
};

use crate::error::AppError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I32(i32),
    Bool(bool),
    Date(NaiveDate),
    Json(Value),
    Null,
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::I32(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

/// Binds one dynamic value to a typed query.
pub fn bind_value<'q, O>(
    query: QueryAs<'q, MySql, O, MySqlArguments>,
    value: &'q SqlValue,
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    match value {
        SqlValue::String(v) => query.bind(v.as_str()),
        SqlValue::I32(v) => query.bind(*v),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
        SqlValue::Null => query.bind(None::<String>),
    }
}

/// ===============================
/// Partial UPDATE builder
/// ===============================
/// Columns are supplied by typed request structs, never by request keys.
#[derive(Debug)]
pub struct SqlUpdate {
    table: &'static str,
    assignments: Vec<(&'static str, SqlValue)>,
}

impl SqlUpdate {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
        }
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        self.assignments.push((column, value.into()));
        self
    }

    /// Sets the column only when the field was supplied.
    pub fn set_if<T: Into<SqlValue>>(&mut self, column: &'static str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// `UPDATE <table> SET a = ?, b = ? WHERE <id_column> = ?`
    pub fn to_sql(&self, id_column: &str) -> Result<String, AppError> {
        if self.assignments.is_empty() {
            return Err(AppError::validation("No fields provided for update"));
        }

        let set_clause = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, set_clause, id_column
        ))
    }

    /// ===============================
    /// Execute the update
    /// ===============================
    pub async fn execute(
        self,
        conn: &mut MySqlConnection,
        id_column: &str,
        id: u64,
    ) -> Result<u64, AppError> {
        let sql = self.to_sql(id_column)?;
        let mut query = sqlx::query(&sql);

        for (_, value) in self.assignments {
            query = match value {
                SqlValue::String(v) => query.bind(v),
                SqlValue::I32(v) => query.bind(v),
                SqlValue::Bool(v) => query.bind(v),
                SqlValue::Date(v) => query.bind(v),
                SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
                SqlValue::Null => query.bind(None::<String>),
            };
        }
        query = query.bind(id);

        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_set_clause_in_insertion_order() {
        let mut update = SqlUpdate::new("attendance");
        update
            .set("present", true)
            .set_if("late_entry", Some(Some("08:10".to_string())))
            .set_if::<String>("comment", None);

        assert_eq!(
            update.to_sql("id").unwrap(),
            "UPDATE attendance SET present = ?, late_entry = ? WHERE id = ?"
        );
    }

    #[test]
    fn explicit_null_becomes_sql_null() {
        let mut update = SqlUpdate::new("attendance");
        update.set_if("early_leave", Some(None::<String>));

        assert_eq!(update.assignments, vec![("early_leave", SqlValue::Null)]);
    }

    #[test]
    fn empty_update_is_a_validation_error() {
        let update = SqlUpdate::new("students");
        assert!(update.is_empty());
        assert!(matches!(update.to_sql("id"), Err(AppError::Validation(_))));
    }
}
