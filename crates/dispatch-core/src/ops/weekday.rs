//! count-weekday: how many dates in a file fall on one weekday

use super::{data_lines, read_text, write_text};
use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

/// Date layouts tried per line, in order
enum Layout {
    Date(&'static str),
    DateTime(&'static str),
}

const LAYOUTS: &[Layout] = &[
    Layout::Date("%Y-%m-%d"),
    Layout::Date("%d-%b-%Y"),
    Layout::Date("%b %d, %Y"),
    Layout::DateTime("%Y/%m/%d %H:%M:%S"),
    Layout::Date("%Y/%m/%d"),
    Layout::Date("%d/%m/%Y"),
];

/// Parse one date line with the first layout that fits
pub(crate) fn parse_date(line: &str) -> Option<NaiveDate> {
    LAYOUTS.iter().find_map(|layout| match layout {
        Layout::Date(fmt) => NaiveDate::parse_from_str(line, fmt).ok(),
        Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(line, fmt)
            .ok()
            .map(|dt| dt.date()),
    })
}

/// Count lines falling on `weekday`; any unparseable line fails the whole count
pub(crate) fn count_weekday(text: &str, weekday: Weekday) -> Result<usize, TaskError> {
    let mut count = 0;
    for (line_no, line) in data_lines(text) {
        let date = parse_date(line)
            .ok_or_else(|| TaskError::Parse(format!("line {line_no}: unrecognized date '{line}'")))?;
        if date.weekday() == weekday {
            count += 1;
        }
    }
    Ok(count)
}

/// Handler for `count-weekday`
#[derive(Debug, Default, Clone, Copy)]
pub struct WeekdayCounter;

#[async_trait::async_trait]
impl OperationHandler for WeekdayCounter {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        _ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let raw = intent.parameter("weekday")?;
        let weekday: Weekday = raw
            .trim()
            .parse()
            .map_err(|_| TaskError::Parse(format!("'{raw}' is not a weekday")))?;

        let input = intent.input()?;
        let output = intent.output()?;
        let count = count_weekday(&read_text(input).await?, weekday)?;

        write_text(output, &count.to_string()).await?;
        tracing::info!(%weekday, count, "weekday count written");
        Ok(Outcome::written(output, format!("{count} {weekday} dates")))
    }
}
