//! The query capability the remember layer wraps

use crate::error::Result;
use crate::types::Value;
use async_trait::async_trait;

/// What a builder method call produced
#[derive(Debug)]
pub enum Outcome<B> {
    /// The call only shaped the query; keep building with the returned builder
    Continuation(B),
    /// The call executed the query and produced a concrete result
    Value(Value),
}

impl<B> Outcome<B> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }
}

/// A query under construction that can be executed by name.
///
/// Implementations consume themselves on every call: a continuation hands
/// the (possibly modified) builder back, a terminal call yields a value.
#[async_trait]
pub trait QueryBuilder: Send + Sized {
    /// The query text as it would be sent to the database
    fn to_sql(&self) -> String;

    /// Bound parameter values, in placeholder order
    fn bindings(&self) -> Vec<Value>;

    /// Invoke a named builder method with positional arguments
    async fn call(self, method: &str, args: Vec<Value>) -> Result<Outcome<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    #[derive(Debug)]
    struct Counter {
        wheres: Vec<Value>,
    }

    #[async_trait]
    impl QueryBuilder for Counter {
        fn to_sql(&self) -> String {
            let mut sql = "select count(*) from t".to_string();
            for (i, _) in self.wheres.iter().enumerate() {
                sql.push_str(if i == 0 { " where c = ?" } else { " and c = ?" });
            }
            sql
        }

        fn bindings(&self) -> Vec<Value> {
            self.wheres.clone()
        }

        async fn call(mut self, method: &str, args: Vec<Value>) -> Result<Outcome<Self>> {
            match method {
                "where" => {
                    self.wheres.extend(args);
                    Ok(Outcome::Continuation(self))
                }
                "count" => Ok(Outcome::Value(Value::Int64(self.wheres.len() as i64))),
                other => Err(QueryError::UnknownMethod(other.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_chain_then_terminal() {
        let query = Counter { wheres: vec![] };
        let query = match query.call("where", vec![Value::Int64(1)]).await.unwrap() {
            Outcome::Continuation(q) => q,
            Outcome::Value(_) => panic!("Expected continuation"),
        };
        assert_eq!(query.to_sql(), "select count(*) from t where c = ?");
        assert_eq!(query.bindings(), vec![Value::Int64(1)]);

        let outcome = query.call("count", vec![]).await.unwrap();
        assert!(outcome.is_terminal());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let query = Counter { wheres: vec![] };
        let err = query.call("explode", vec![]).await.unwrap_err();
        assert!(matches!(err, QueryError::UnknownMethod(m) if m == "explode"));
    }
}
