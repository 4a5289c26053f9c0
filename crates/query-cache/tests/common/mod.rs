//! A small in-memory table and query builder to remember against

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use query_core::{Outcome, QueryBuilder, QueryError, Result, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type Row = BTreeMap<String, Value>;

/// Shared rows plus a count of terminal calls that reached them
#[derive(Clone, Default)]
pub struct Database {
    rows: Arc<Mutex<Vec<Row>>>,
    executions: Arc<AtomicUsize>,
    shuffles: Arc<AtomicUsize>,
}

impl Database {
    /// A users table with ids `1..=count`
    pub fn with_users(count: i64) -> Self {
        let db = Self::default();
        {
            let mut rows = db.rows.lock();
            for id in 1..=count {
                rows.push(user(id, &format!("user{}", id)));
            }
        }
        db
    }

    pub fn users(&self) -> UsersQuery {
        UsersQuery {
            db: self.clone(),
            columns: None,
            wheres: Vec::new(),
            random: false,
            delay: None,
        }
    }

    pub fn insert(&self, row: Row) {
        self.rows.lock().push(row);
    }

    pub fn delete_id(&self, id: i64) {
        self.rows
            .lock()
            .retain(|row| row.get("id") != Some(&Value::Int64(id)));
    }

    pub fn truncate(&self) {
        self.rows.lock().clear();
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.rows
            .lock()
            .iter()
            .any(|row| row.get("name") == Some(&Value::from(name)))
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

pub fn user(id: i64, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), Value::Int64(id));
    row.insert("name".to_string(), Value::from(name));
    row.insert(
        "email".to_string(),
        Value::from(format!("{}@example.com", name)),
    );
    row
}

/// Builder over the users table
pub struct UsersQuery {
    db: Database,
    columns: Option<Vec<String>>,
    wheres: Vec<(String, Value)>,
    random: bool,
    delay: Option<Duration>,
}

impl UsersQuery {
    /// Continue with a builder method that must not be terminal
    pub async fn chain(self, method: &str, args: Vec<Value>) -> Self {
        match self.call(method, args).await {
            Ok(Outcome::Continuation(query)) => query,
            Ok(Outcome::Value(value)) => panic!("{} was terminal: {}", method, value),
            Err(err) => panic!("{} failed: {}", method, err),
        }
    }

    pub async fn filter(self, column: &str, value: impl Into<Value>) -> Self {
        self.chain("where", vec![Value::from(column), value.into()]).await
    }

    pub async fn in_random_order(self) -> Self {
        self.chain("inRandomOrder", Vec::new()).await
    }

    /// Make terminal calls take `delay`
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn matching(&self, rows: &[Row]) -> Vec<Row> {
        let mut matched: Vec<Row> = rows
            .iter()
            .filter(|row| {
                self.wheres
                    .iter()
                    .all(|(column, value)| row.get(column) == Some(value))
            })
            .cloned()
            .collect();

        if self.random && !matched.is_empty() {
            let turn = self.db.shuffles.fetch_add(1, Ordering::SeqCst);
            let len = matched.len();
            matched.rotate_left((turn * 7 + 3) % len);
        }
        matched
    }

    fn project(&self, row: &Row) -> Value {
        match &self.columns {
            Some(columns) => Value::Record(
                row.iter()
                    .filter(|(column, _)| columns.contains(*column))
                    .map(|(column, value)| (column.clone(), value.clone()))
                    .collect(),
            ),
            None => Value::Record(row.clone()),
        }
    }

    async fn execute(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.db.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut rows = self.db.rows.lock();
        let matched = self.matching(&rows);

        match method {
            "get" => Ok(Value::List(
                matched.iter().map(|row| self.project(row)).collect(),
            )),
            "first" => Ok(matched
                .first()
                .map(|row| self.project(row))
                .unwrap_or(Value::Null)),
            "value" => {
                let column = args.first().and_then(Value::as_str).ok_or_else(|| {
                    QueryError::InvalidArgument("value() expects a column".to_string())
                })?;
                Ok(matched
                    .first()
                    .and_then(|row| row.get(column).cloned())
                    .unwrap_or(Value::Null))
            }
            "count" => Ok(Value::Int64(matched.len() as i64)),
            "update" => {
                let changes = args.first().and_then(Value::as_record).ok_or_else(|| {
                    QueryError::InvalidArgument("update() expects a record".to_string())
                })?;
                let mut updated = 0;
                for row in rows.iter_mut().filter(|row| matched.contains(&**row)) {
                    for (column, value) in changes {
                        row.insert(column.clone(), value.clone());
                    }
                    updated += 1;
                }
                Ok(Value::Int64(updated))
            }
            "delete" => {
                let before = rows.len();
                rows.retain(|row| !matched.contains(row));
                Ok(Value::Int64((before - rows.len()) as i64))
            }
            other => Err(QueryError::UnknownMethod(other.to_string())),
        }
    }
}

#[async_trait]
impl QueryBuilder for UsersQuery {
    fn to_sql(&self) -> String {
        let columns = match &self.columns {
            Some(columns) => columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", "),
            None => "*".to_string(),
        };
        let mut sql = format!("select {} from \"users\"", columns);
        for (i, (column, _)) in self.wheres.iter().enumerate() {
            sql.push_str(if i == 0 { " where " } else { " and " });
            sql.push_str(&format!("\"{}\" = ?", column));
        }
        if self.random {
            sql.push_str(" order by RANDOM()");
        }
        sql
    }

    fn bindings(&self) -> Vec<Value> {
        self.wheres.iter().map(|(_, value)| value.clone()).collect()
    }

    async fn call(mut self, method: &str, args: Vec<Value>) -> Result<Outcome<Self>> {
        match method {
            "select" => {
                self.columns = Some(
                    args.iter()
                        .filter_map(|arg| arg.as_str().map(str::to_string))
                        .collect(),
                );
                Ok(Outcome::Continuation(self))
            }
            "where" => match args.as_slice() {
                [Value::Utf8(column), value] => {
                    self.wheres.push((column.clone(), value.clone()));
                    Ok(Outcome::Continuation(self))
                }
                _ => Err(QueryError::InvalidArgument(
                    "where() expects a column and a value".to_string(),
                )),
            },
            "inRandomOrder" => {
                self.random = true;
                Ok(Outcome::Continuation(self))
            }
            _ => self.execute(method, &args).await.map(Outcome::Value),
        }
    }
}
