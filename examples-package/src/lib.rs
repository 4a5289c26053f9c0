//! Demo users table for the remember example
//!
//! Just enough of a query builder to show remembering in action: equality
//! filters, a rotating "random" order and a handful of terminal calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use query_core::{Outcome, QueryBuilder, QueryError, Result, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
}

impl User {
    fn to_value(&self) -> Value {
        Value::record([
            ("id", Value::Int64(self.id)),
            ("name", Value::from(self.name.as_str())),
        ])
    }

    fn column(&self, column: &str) -> Value {
        match column {
            "id" => Value::Int64(self.id),
            "name" => Value::from(self.name.as_str()),
            _ => Value::Null,
        }
    }
}

/// A shared in-memory users table that counts the queries it answers
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    rows: Arc<Mutex<Vec<User>>>,
    queries: Arc<AtomicUsize>,
}

impl UserTable {
    pub fn seeded(names: &[&str]) -> Self {
        let table = Self::default();
        table.rows.lock().extend(names.iter().enumerate().map(|(i, name)| User {
            id: i as i64 + 1,
            name: name.to_string(),
        }));
        table
    }

    pub fn query(&self) -> UserQuery {
        UserQuery {
            table: self.clone(),
            filters: Vec::new(),
            random: false,
        }
    }

    pub fn delete(&self, id: i64) {
        self.rows.lock().retain(|user| user.id != id);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Number of terminal calls that reached the table
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

pub struct UserQuery {
    table: UserTable,
    filters: Vec<(String, Value)>,
    random: bool,
}

impl UserQuery {
    fn matching(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .table
            .rows
            .lock()
            .iter()
            .filter(|user| {
                self.filters
                    .iter()
                    .all(|(column, value)| user.column(column) == *value)
            })
            .cloned()
            .collect();

        if self.random && !users.is_empty() {
            let shift = self.table.queries() % users.len();
            users.rotate_left(shift);
        }
        users
    }
}

#[async_trait]
impl QueryBuilder for UserQuery {
    fn to_sql(&self) -> String {
        let mut sql = "select * from users".to_string();
        for (i, (column, _)) in self.filters.iter().enumerate() {
            sql.push_str(if i == 0 { " where " } else { " and " });
            sql.push_str(column);
            sql.push_str(" = ?");
        }
        if self.random {
            sql.push_str(" order by RANDOM()");
        }
        sql
    }

    fn bindings(&self) -> Vec<Value> {
        self.filters.iter().map(|(_, value)| value.clone()).collect()
    }

    async fn call(mut self, method: &str, args: Vec<Value>) -> Result<Outcome<Self>> {
        match (method, args.as_slice()) {
            ("where", [Value::Utf8(column), value]) => {
                self.filters.push((column.clone(), value.clone()));
                return Ok(Outcome::Continuation(self));
            }
            ("inRandomOrder", []) => {
                self.random = true;
                return Ok(Outcome::Continuation(self));
            }
            _ => {}
        }

        let users = self.matching();
        self.table.queries.fetch_add(1, Ordering::SeqCst);

        let value = match (method, args.as_slice()) {
            ("get", []) => Value::List(users.iter().map(User::to_value).collect()),
            ("first", []) => users.first().map(User::to_value).unwrap_or(Value::Null),
            ("value", [Value::Utf8(column)]) => users
                .first()
                .map(|user| user.column(column))
                .unwrap_or(Value::Null),
            ("count", []) => Value::Int64(users.len() as i64),
            _ => {
                return Err(QueryError::UnknownMethod(format!(
                    "{}({} args)",
                    method,
                    args.len()
                )))
            }
        };
        Ok(Outcome::Value(value))
    }
}
