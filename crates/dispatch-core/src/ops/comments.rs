//! similar-comments: the most similar pair of comments by embedding

use super::{read_text, write_text};
use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use dispatch_collab::EmbeddingRequest;

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Index pair `(i, j)` with `i < j` of maximum similarity
///
/// Scanning is row-major and only a strictly greater score replaces the
/// current best, so ties resolve to the lexicographically smallest pair.
/// Non-finite scores never win. Returns `None` when no pair has a finite
/// score, including for fewer than two vectors.
pub(crate) fn most_similar_pair(vectors: &[Vec<f32>]) -> Option<(usize, usize)> {
    let mut best: Option<((usize, usize), f32)> = None;
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            let score = cosine_similarity(&vectors[i], &vectors[j]);
            if !score.is_finite() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some(((i, j), score)),
            }
        }
    }
    best.map(|(pair, _)| pair)
}

/// Handler for `similar-comments`
#[derive(Debug, Default, Clone, Copy)]
pub struct CommentMatcher;

#[async_trait::async_trait]
impl OperationHandler for CommentMatcher {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let input = intent.input()?;
        let output = intent.output()?;

        let text = read_text(input).await?;
        let comments: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        if comments.len() < 2 {
            return Err(TaskError::InsufficientInput(format!(
                "need at least 2 comments, found {}",
                comments.len()
            )));
        }

        let request = EmbeddingRequest {
            model: ctx.config.collaborator.embedding_model.clone(),
            inputs: comments.clone(),
        };
        let vectors = ctx.collaborators.embedding()?.embed(request).await?;
        if vectors.len() != comments.len() {
            return Err(TaskError::malformed_response(format!(
                "expected {} embeddings, got {}",
                comments.len(),
                vectors.len()
            )));
        }

        let (i, j) = most_similar_pair(&vectors)
            .ok_or_else(|| TaskError::malformed_response("no finite similarity between embeddings"))?;
        write_text(output, &format!("{}\n{}\n", comments[i], comments[j])).await?;

        tracing::info!(comments = comments.len(), first = i, second = j, "most similar pair written");
        Ok(Outcome::written(output, format!("comments {i} and {j} are most similar")))
    }
}
