//! Shared connector helpers: config decoding, the no-row probe for result
//! column inference, the readonly statement guard and sqlx error mapping.

use sqlgate_core::{ColumnSchema, ColumnType, GatewayError, GatewayResult};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlx::{Column, Database, Executor, Pool, Statement as _, TypeInfo};

/// Decode the polymorphic `connection` YAML node.
///
/// A scalar node is a DSN and goes through `from_dsn`; a mapping node is
/// decoded into the connector's config struct, which rejects unknown fields.
pub(crate) fn decode_connection<T>(
    value: &serde_yaml::Value,
    from_dsn: impl FnOnce(String) -> T,
) -> GatewayResult<T>
where
    T: serde::de::DeserializeOwned,
{
    match value {
        serde_yaml::Value::String(dsn) => Ok(from_dsn(dsn.clone())),
        other => serde_yaml::from_value(other.clone())
            .map_err(|e| GatewayError::bad_config("database.connection", e.to_string())),
    }
}

/// Dialect-agnostic result column inference.
///
/// Wraps the caller's query so no rows can come back, prepares it, and maps
/// the driver's declared column types through `guess`.
pub(crate) async fn probe_result_columns<DB, F>(
    pool: &Pool<DB>,
    query: &str,
    guess: F,
) -> GatewayResult<Vec<ColumnSchema>>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
    F: Fn(&str) -> ColumnType,
{
    let probe = format!("SELECT * FROM ({}) AS probe LIMIT 0", query.trim_end_matches(';'));
    let mut conn = pool.acquire().await.map_err(map_sqlx_error)?;
    let statement = (&mut *conn).prepare(&probe).await.map_err(map_sqlx_error)?;

    Ok(statement
        .columns()
        .iter()
        .map(|col| ColumnSchema::new(col.name(), guess(col.type_info().name())))
        .collect())
}

/// Reject mutating statements before they reach the driver.
///
/// Statements that do not parse are passed through: the session-level
/// readonly mode (or the dialect's own error) is the backstop.
pub(crate) fn assert_readonly_allowed(sql: &str) -> GatewayResult<()> {
    let statements = match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(statements) => statements,
        Err(_) => return Ok(()),
    };
    for statement in statements {
        match statement {
            Statement::Query(_) | Statement::Explain { .. } => {}
            _ => return Err(GatewayError::Readonly),
        }
    }
    Ok(())
}

/// Map sqlx errors into the gateway taxonomy.
///
/// Readonly violations raised by the backend itself (Postgres SQLSTATE 25006,
/// SQLite "readonly database") surface as `Readonly`; everything else is a
/// wrapped backend error.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> GatewayError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("25006")
            || db_err.message().contains("readonly database")
        {
            return GatewayError::Readonly;
        }
    }
    match err {
        sqlx::Error::PoolClosed => GatewayError::Closed,
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            GatewayError::Connect(err.to_string())
        }
        other => GatewayError::backend(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_allows_selects() {
        assert!(assert_readonly_allowed("SELECT * FROM employees").is_ok());
        assert!(assert_readonly_allowed(
            "WITH recent AS (SELECT * FROM orders) SELECT count(*) FROM recent"
        )
        .is_ok());
    }

    #[test]
    fn test_guard_rejects_mutations() {
        for sql in [
            "DELETE FROM employees",
            "UPDATE employees SET salary = 0",
            "INSERT INTO employees (name) VALUES ('x')",
            "DROP TABLE employees",
            "TRUNCATE TABLE employees",
        ] {
            assert!(
                matches!(assert_readonly_allowed(sql), Err(GatewayError::Readonly)),
                "expected readonly rejection for {sql}"
            );
        }
    }

    #[test]
    fn test_guard_passes_unparseable_sql_through() {
        assert!(assert_readonly_allowed("SHOW TABLES LIKE % IN WAREHOUSE").is_ok());
    }
}
