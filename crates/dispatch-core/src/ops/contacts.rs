//! sort-contacts: stable sort of contact records by (last_name, first_name)

use super::{read_text, write_text};
use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use serde_json::Value;

fn name_field<'a>(record: &'a Value, field: &str, index: usize) -> Result<&'a str, TaskError> {
    record
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| TaskError::Parse(format!("contact {index} has no string '{field}'")))
}

/// Sort records in place; ties keep their original order
///
/// Comparison is byte-wise on the raw strings. Every record keeps all of
/// its fields.
pub(crate) fn sort_contacts(records: &mut Vec<Value>) -> Result<(), TaskError> {
    let mut keyed = Vec::with_capacity(records.len());
    for (index, record) in records.drain(..).enumerate() {
        let last = name_field(&record, "last_name", index)?.to_owned();
        let first = name_field(&record, "first_name", index)?.to_owned();
        keyed.push(((last, first), record));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    records.extend(keyed.into_iter().map(|(_, record)| record));
    Ok(())
}

/// Handler for `sort-contacts`
#[derive(Debug, Default, Clone, Copy)]
pub struct ContactSorter;

#[async_trait::async_trait]
impl OperationHandler for ContactSorter {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        _ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let input = intent.input()?;
        let output = intent.output()?;

        let text = read_text(input).await?;
        let mut records: Vec<Value> = serde_json::from_str(&text)
            .map_err(|e| TaskError::Parse(format!("contacts are not a JSON array of objects: {e}")))?;
        sort_contacts(&mut records)?;

        let rendered = serde_json::to_string(&records)
            .map_err(|e| TaskError::Execution(format!("cannot serialize contacts: {e}")))?;
        write_text(output, &rendered).await?;

        tracing::info!(count = records.len(), "contacts sorted");
        Ok(Outcome::written(output, format!("sorted {} contacts", records.len())))
    }
}
