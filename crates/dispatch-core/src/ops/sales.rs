//! sum-by-category: total quantity × price for one category in SQLite

use super::write_text;
use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::config::SalesConfig;
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use rusqlite::{params, Connection, ErrorCode, OpenFlags};
use std::path::{Path, PathBuf};

fn sql_error(path: &Path, err: rusqlite::Error) -> TaskError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::NotADatabase => {
            TaskError::Parse(format!("{} is not a SQLite database", path.display()))
        }
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.starts_with("no such table") => {
            TaskError::InputNotFound(format!("{}: {message}", path.display()))
        }
        _ => TaskError::Execution(format!("query on {} failed: {err}", path.display())),
    }
}

/// Sum of quantity × price over rows whose category matches exactly
///
/// No matching rows yields zero.
pub(crate) fn category_total(
    db: &Path,
    schema: &SalesConfig,
    category: &str,
) -> Result<f64, TaskError> {
    let conn = Connection::open_with_flags(
        db,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| sql_error(db, e))?;

    let total: Option<f64> = conn
        .query_row(&schema.sum_query(), params![category], |row| row.get(0))
        .map_err(|e| sql_error(db, e))?;
    Ok(total.unwrap_or(0.0))
}

/// Handler for `sum-by-category`
#[derive(Debug, Default, Clone, Copy)]
pub struct CategoryTotal;

#[async_trait::async_trait]
impl OperationHandler for CategoryTotal {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let category = intent.parameter("category")?.to_string();
        let output = intent.output()?;
        let db: PathBuf = intent.input()?.as_path().to_path_buf();
        let schema = ctx.config.sales.clone();

        let lookup = category.clone();
        let total = tokio::task::spawn_blocking(move || category_total(&db, &schema, &lookup))
            .await
            .map_err(|e| TaskError::Execution(format!("query task failed: {e}")))??;

        write_text(output, &total.to_string()).await?;
        tracing::info!(%category, total, "category total written");
        Ok(Outcome::written(output, format!("{category} total is {total}")))
    }
}
