use crate::error::Result;
use crate::options::TransactionOptions;
use std::borrow::Cow;

/// Per-backend translation of [`TransactionOptions`] into a begin statement.
///
/// `Ok(None)` means a plain `BEGIN` is enough. Options the backend cannot
/// honour are rejected with [`Error::UnsupportedOptions`](crate::Error::UnsupportedOptions) rather than silently
/// dropped.
pub trait TransactionDialect: sqlx::Database {
    fn begin_statement(options: &TransactionOptions) -> Result<Option<Cow<'static, str>>>;
}

#[cfg(feature = "mysql")]
impl TransactionDialect for sqlx::MySql {
    fn begin_statement(options: &TransactionOptions) -> Result<Option<Cow<'static, str>>> {
        if options.is_default() {
            return Ok(None);
        }

        // MySQL only accepts the isolation level ahead of START TRANSACTION,
        // where it applies to the next transaction on the connection.
        let mut statement = String::new();
        if let Some(level) = options.isolation.as_sql() {
            statement.push_str("SET TRANSACTION ISOLATION LEVEL ");
            statement.push_str(level);
            statement.push_str("; ");
        }
        statement.push_str("START TRANSACTION");
        if options.read_only {
            statement.push_str(" READ ONLY");
        }
        Ok(Some(statement.into()))
    }
}

#[cfg(feature = "postgres")]
impl TransactionDialect for sqlx::Postgres {
    fn begin_statement(options: &TransactionOptions) -> Result<Option<Cow<'static, str>>> {
        if options.is_default() {
            return Ok(None);
        }

        let mut statement = String::from("BEGIN");
        if let Some(level) = options.isolation.as_sql() {
            statement.push_str(" ISOLATION LEVEL ");
            statement.push_str(level);
        }
        if options.read_only {
            statement.push_str(" READ ONLY");
        }
        Ok(Some(statement.into()))
    }
}

#[cfg(feature = "sqlite")]
impl TransactionDialect for sqlx::Sqlite {
    fn begin_statement(options: &TransactionOptions) -> Result<Option<Cow<'static, str>>> {
        use crate::error::Error;
        use crate::options::IsolationLevel;

        if options.read_only {
            return Err(Error::UnsupportedOptions(
                "SQLite has no read-only transactions".to_string(),
            ));
        }
        match options.isolation {
            IsolationLevel::Default => Ok(None),
            // Taking the write lock up front gives serializable behaviour
            // across connections.
            IsolationLevel::Serializable => Ok(Some(Cow::Borrowed("BEGIN IMMEDIATE"))),
            level => Err(Error::UnsupportedOptions(format!(
                "SQLite does not support isolation level {level}"
            ))),
        }
    }
}
