//! Language-model fallback classifier
//!
//! Sends one completion request listing the catalog's operations and parses
//! a strict labeled-line answer:
//!
//! ```text
//! operation: count-weekday
//! input_file: /data/dates.txt
//! output_file: /data/dates-wednesdays.txt
//! param.weekday: Wednesday
//! ```
//!
//! A missing label is a malformed response. An operation the catalog does
//! not know is treated as "no mapping".

use super::Classifier;
use crate::catalog::OperationCatalog;
use crate::error::TaskError;
use crate::types::{IntentSource, OperationId, ParsedIntent, Parameters};
use dispatch_collab::{CompletionClient, CompletionRequest};
use std::collections::BTreeMap;
use std::sync::Arc;

const PARAM_PREFIX: &str = "param.";

/// Completion-backed classifier
#[derive(Clone)]
pub struct LlmClassifier {
    client: Arc<dyn CompletionClient>,
    catalog: Arc<OperationCatalog>,
    model: String,
}

impl LlmClassifier {
    /// Create classifier using `model` on `client`
    #[inline]
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        catalog: Arc<OperationCatalog>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            catalog,
            model: model.into(),
        }
    }

    /// System instruction naming every catalog operation
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You route data-processing tasks to one operation. Answer with exactly these \
             labeled lines and nothing else:\n\
             operation: <operation name or none>\n\
             input_file: <path or none>\n\
             output_file: <path or none>\n\
             Add one `param.<name>: <value>` line per required parameter you can find.\n\n\
             Operations:\n",
        );
        for descriptor in self.catalog.iter() {
            prompt.push_str("- ");
            prompt.push_str(descriptor.id.as_str());
            prompt.push_str(": ");
            prompt.push_str(descriptor.summary);
            if !descriptor.required_parameters.is_empty() {
                prompt.push_str(" (params: ");
                prompt.push_str(&descriptor.required_parameters.join(", "));
                prompt.push(')');
            }
            prompt.push('\n');
        }
        prompt
    }

    /// Parse a labeled-line answer
    ///
    /// # Errors
    /// Returns `ExternalService` when a required label is missing.
    pub fn parse_response(&self, response: &str) -> Result<Option<ParsedIntent>, TaskError> {
        let fields = labeled_fields(response);
        let field = |label: &str| -> Result<Option<String>, TaskError> {
            let value = fields.get(label).ok_or_else(|| {
                TaskError::malformed_response(format!("classifier response has no '{label}' line"))
            })?;
            Ok(meaningful(value).map(str::to_string))
        };

        let operation = field("operation")?;
        let input = field("input_file")?;
        let output = field("output_file")?;

        let Some(operation) = operation else {
            tracing::debug!("model found no operation");
            return Ok(None);
        };
        let operation = match operation.parse::<OperationId>() {
            Ok(op) if self.catalog.contains(op) => op,
            _ => {
                tracing::warn!(%operation, "model named an unknown operation");
                return Ok(None);
            }
        };

        let parameters: Parameters = fields
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(PARAM_PREFIX)?;
                let value = meaningful(value)?;
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Ok(Some(ParsedIntent {
            operation: Some(operation),
            input,
            output,
            parameters,
            source: IntentSource::Model,
        }))
    }
}

impl std::fmt::Debug for LlmClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClassifier")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// `label: value` lines keyed by normalized label; first occurrence wins
fn labeled_fields(response: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in response.lines() {
        let line = line
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim()
            .replace("**", "");
        if line.starts_with("```") {
            continue;
        }
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = normalize_label(label);
        if label.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches(['`', '"', '\'']).trim().to_string();
        fields.entry(label).or_insert(value);
    }
    fields
}

fn normalize_label(label: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    match label.strip_prefix(PARAM_PREFIX) {
        Some(name) => format!("{PARAM_PREFIX}{}", name.trim()),
        None => label.replace([' ', '-'], "_"),
    }
}

/// `None` for placeholder values meaning "unset"
fn meaningful(value: &str) -> Option<&str> {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "" | "none" | "null" | "n/a" | "unknown" => None,
        _ => Some(value),
    }
}

#[async_trait::async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, text: &str) -> Result<Option<ParsedIntent>, TaskError> {
        let request = CompletionRequest::text(&self.model, self.system_prompt(), text);
        let response = self.client.complete(request).await.map_err(|e| {
            tracing::warn!(error = %e, "classification request failed");
            TaskError::ExternalService(e)
        })?;
        self.parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use dispatch_collab::CollaboratorError;
    use pretty_assertions::assert_eq;

    struct Reply(Result<&'static str, CollaboratorError>);

    #[async_trait::async_trait]
    impl CompletionClient for Reply {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CollaboratorError> {
            match &self.0 {
                Ok(text) => Ok((*text).to_string()),
                Err(_) => Err(CollaboratorError::Timeout { duration_secs: 30 }),
            }
        }
    }

    fn classifier(reply: Result<&'static str, CollaboratorError>) -> LlmClassifier {
        LlmClassifier::new(
            Arc::new(Reply(reply)),
            Arc::new(OperationCatalog::standard()),
            "test-model",
        )
    }

    #[test]
    fn prompt_lists_every_operation() {
        let prompt = classifier(Ok("")).system_prompt();
        for op in OperationId::ALL {
            assert!(prompt.contains(op.as_str()), "{op} missing from prompt");
        }
        assert!(prompt.contains("params: weekday"));
    }

    #[test]
    fn parses_labeled_lines() {
        let c = classifier(Ok(""));
        let intent = c
            .parse_response(
                "Operation: count-weekday\n\
                 - **Input_File**: /data/dates.txt\n\
                 output file: `/data/out.txt`\n\
                 param.weekday: Wednesday\n",
            )
            .unwrap()
            .unwrap();

        assert_eq!(intent.operation, Some(OperationId::CountWeekday));
        assert_eq!(intent.input.as_deref(), Some("/data/dates.txt"));
        assert_eq!(intent.output.as_deref(), Some("/data/out.txt"));
        assert_eq!(intent.parameters["weekday"], "Wednesday");
        assert_eq!(intent.source, IntentSource::Model);
    }

    #[test]
    fn none_values_are_unset() {
        let c = classifier(Ok(""));
        let intent = c
            .parse_response("operation: recent_logs\ninput_file: none\noutput_file:\n")
            .unwrap()
            .unwrap();
        assert_eq!(intent.operation, Some(OperationId::RecentLogs));
        assert_eq!(intent.input, None);
        assert_eq!(intent.output, None);
    }

    #[test]
    fn operation_none_is_no_mapping() {
        let c = classifier(Ok(""));
        let result = c
            .parse_response("operation: none\ninput_file: none\noutput_file: none")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn hallucinated_operation_is_no_mapping() {
        let c = classifier(Ok(""));
        let result = c
            .parse_response("operation: translate-poem\ninput_file: /data/a\noutput_file: /data/b")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_label_is_malformed() {
        let c = classifier(Ok(""));
        let err = c
            .parse_response("operation: count-weekday\ninput_file: /data/dates.txt")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalServiceError);
    }

    #[test]
    fn free_prose_is_malformed() {
        let c = classifier(Ok(""));
        let err = c.parse_response("I think you want to count some days.").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalServiceError);
    }

    #[tokio::test]
    async fn collaborator_failure_is_external_error() {
        let c = classifier(Err(CollaboratorError::Timeout { duration_secs: 30 }));
        let err = c.classify("count wednesdays").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalServiceError);
    }

    #[tokio::test]
    async fn classify_round_trip() {
        let c = classifier(Ok(
            "operation: sort-contacts\ninput_file: /data/c.json\noutput_file: /data/s.json",
        ));
        let intent = c.classify("order my address book").await.unwrap().unwrap();
        assert_eq!(intent.operation, Some(OperationId::SortContacts));
    }
}
