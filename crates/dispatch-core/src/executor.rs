//! Operation execution boundary
//!
//! Every handler error is converted into a failure [`ExecutionResult`] here;
//! nothing raised by a handler escapes this type.

use crate::catalog::{HandlerContext, OperationCatalog};
use crate::error::TaskError;
use crate::types::{ExecutionResult, ResolvedIntent};
use std::sync::Arc;

/// Dispatches resolved intents to their handlers
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    catalog: Arc<OperationCatalog>,
    context: HandlerContext,
}

impl OperationExecutor {
    /// Create executor
    #[inline]
    #[must_use]
    pub fn new(catalog: Arc<OperationCatalog>, context: HandlerContext) -> Self {
        Self { catalog, context }
    }

    /// Run the intent's handler once; never retries
    pub async fn execute(&self, intent: &ResolvedIntent) -> ExecutionResult {
        let operation = intent.operation();
        let Some(descriptor) = self.catalog.get(operation) else {
            let err = TaskError::Execution(format!("no handler registered for {operation}"));
            tracing::error!(%operation, "resolved intent has no handler");
            return ExecutionResult::failure(Some(operation), &err);
        };

        tracing::info!(%operation, "executing operation");
        match descriptor.handler.execute(intent, &self.context).await {
            Ok(outcome) => {
                tracing::info!(%operation, summary = %outcome.summary, "operation completed");
                ExecutionResult::success(
                    operation,
                    outcome.summary,
                    outcome.artifact.map(|p| p.into_path_buf()),
                )
            }
            Err(err) => {
                tracing::error!(
                    %operation,
                    kind = ?err.kind(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "operation failed"
                );
                ExecutionResult::failure(Some(operation), &err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InputKind, OperationDescriptor, OperationHandler, Outcome, PathRole};
    use crate::error::ErrorKind;
    use crate::ops::testing;
    use crate::types::{ExecutionStatus, OperationId};

    struct Failing;

    #[async_trait::async_trait]
    impl OperationHandler for Failing {
        async fn execute(
            &self,
            _intent: &ResolvedIntent,
            _ctx: &HandlerContext,
        ) -> Result<Outcome, TaskError> {
            Err(TaskError::Parse("line 3: unrecognized date".into()))
        }
    }

    struct Acting;

    #[async_trait::async_trait]
    impl OperationHandler for Acting {
        async fn execute(
            &self,
            _intent: &ResolvedIntent,
            _ctx: &HandlerContext,
        ) -> Result<Outcome, TaskError> {
            Ok(Outcome::action("done"))
        }
    }

    fn catalog_with(handler: Arc<dyn OperationHandler>) -> Arc<OperationCatalog> {
        let mut catalog = OperationCatalog::new();
        catalog.register(OperationDescriptor {
            id: OperationId::CountWeekday,
            summary: "test",
            input: PathRole::Unused,
            input_kind: InputKind::File,
            output: PathRole::Unused,
            required_parameters: &[],
            handler,
        });
        Arc::new(catalog)
    }

    #[tokio::test]
    async fn handler_error_becomes_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::plain_context(&dir);
        let intent = testing::intent(&ctx, OperationId::CountWeekday, None, None, &[]);
        let executor = OperationExecutor::new(catalog_with(Arc::new(Failing)), ctx);

        let result = executor.execute(&intent).await;
        assert_eq!(result.status, ExecutionStatus::Failure);
        assert_eq!(result.error_kind, Some(ErrorKind::ParseError));
        assert!(result.message.contains("line 3"));
        assert_eq!(result.artifact_path, None);
    }

    #[tokio::test]
    async fn success_carries_summary() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::plain_context(&dir);
        let intent = testing::intent(&ctx, OperationId::CountWeekday, None, None, &[]);
        let executor = OperationExecutor::new(catalog_with(Arc::new(Acting)), ctx);

        let result = executor.execute(&intent).await;
        assert!(result.is_success());
        assert_eq!(result.message, "done");
        assert_eq!(result.operation, Some(OperationId::CountWeekday));
    }

    #[tokio::test]
    async fn unregistered_operation_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::plain_context(&dir);
        let intent = testing::intent(&ctx, OperationId::SortContacts, None, None, &[]);
        let executor = OperationExecutor::new(Arc::new(OperationCatalog::new()), ctx);

        let result = executor.execute(&intent).await;
        assert_eq!(result.status, ExecutionStatus::Failure);
    }
}
