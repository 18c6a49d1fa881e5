//! Testing utilities for the dispatch workspace
//!
//! Collaborator fakes, a temporary data-root fixture, and engine setup.

#![allow(missing_docs)]

use dispatch_collab::{
    CollaboratorError, CompletionClient, CompletionRequest, EmbeddingClient, EmbeddingRequest,
    ProcessOutput, ProcessRunner, ProcessSpec,
};
use dispatch_core::{Collaborators, EngineConfig, TaskEngine};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Completion fake answering from a queue of scripted replies
///
/// Once the queue is drained every further request is answered with
/// `fallback_reply`. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback_reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests with these texts, in order
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// Fail every request as unreachable
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Queue a reply
    #[must_use]
    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    /// Queue an unreachable failure
    #[must_use]
    pub fn then_fail(self, reason: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Err(reason.into()));
        self
    }

    /// Reply used once the queue is empty
    #[must_use]
    pub fn otherwise(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = Some(reply.into());
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(CollaboratorError::Unreachable(reason)),
            None => self
                .fallback_reply
                .clone()
                .ok_or_else(|| CollaboratorError::Unreachable("no scripted reply left".to_string())),
        }
    }
}

/// Embedding fake with a fixed vector per text
#[derive(Debug, Default)]
pub struct FixedEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    calls: Mutex<usize>,
}

impl FixedEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for FixedEmbeddings {
    async fn embed(&self, request: EmbeddingRequest) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        *self.calls.lock().unwrap() += 1;
        request
            .inputs
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .ok_or_else(|| CollaboratorError::malformed(format!("no vector for '{text}'")))
            })
            .collect()
    }
}

/// Process fake that records specs and exits with a fixed code
#[derive(Debug)]
pub struct RecordingProcessRunner {
    exit_code: i32,
    stderr: String,
    specs: Mutex<Vec<ProcessSpec>>,
}

impl RecordingProcessRunner {
    /// Runner whose processes all succeed
    pub fn succeeding() -> Self {
        Self::exiting(0, "")
    }

    /// Runner whose processes exit with `code` and print `stderr`
    pub fn exiting(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: code,
            stderr: stderr.into(),
            specs: Mutex::new(Vec::new()),
        }
    }

    pub fn specs(&self) -> Vec<ProcessSpec> {
        self.specs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProcessRunner for RecordingProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, CollaboratorError> {
        self.specs.lock().unwrap().push(spec.clone());
        if self.exit_code == spec.expected_exit_code {
            Ok(ProcessOutput {
                exit_code: Some(self.exit_code),
                stdout: String::new(),
                stderr: self.stderr.clone(),
            })
        } else {
            Err(CollaboratorError::UnexpectedExit {
                program: spec.program.clone(),
                expected: spec.expected_exit_code,
                actual: Some(self.exit_code),
                stderr: self.stderr.clone(),
            })
        }
    }
}

/// Temporary data root
#[derive(Debug)]
pub struct DataRoot {
    dir: TempDir,
}

impl DataRoot {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write a file, creating parent directories
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Default engine config rooted here, with `/data` as the virtual root
    pub fn config(&self) -> EngineConfig {
        EngineConfig::new(self.root())
    }
}

impl Default for DataRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborator bundle of fakes
#[derive(Debug, Clone)]
pub struct Fakes {
    pub completion: Option<Arc<ScriptedCompletion>>,
    pub embeddings: Option<Arc<FixedEmbeddings>>,
    pub process: Arc<RecordingProcessRunner>,
}

impl Fakes {
    /// Succeeding process runner and no model collaborators
    pub fn offline() -> Self {
        Self {
            completion: None,
            embeddings: None,
            process: Arc::new(RecordingProcessRunner::succeeding()),
        }
    }

    #[must_use]
    pub fn with_completion(mut self, completion: ScriptedCompletion) -> Self {
        self.completion = Some(Arc::new(completion));
        self
    }

    #[must_use]
    pub fn with_embeddings(mut self, embeddings: FixedEmbeddings) -> Self {
        self.embeddings = Some(Arc::new(embeddings));
        self
    }

    #[must_use]
    pub fn with_process(mut self, process: RecordingProcessRunner) -> Self {
        self.process = Arc::new(process);
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        let mut collaborators = Collaborators::new(self.process.clone());
        if let Some(completion) = &self.completion {
            collaborators = collaborators.with_completion(completion.clone());
        }
        if let Some(embeddings) = &self.embeddings {
            collaborators = collaborators.with_embedding(embeddings.clone());
        }
        collaborators
    }
}

/// Engine over `root` with the given fakes
pub fn setup_engine(root: &DataRoot, fakes: &Fakes) -> TaskEngine {
    TaskEngine::new(root.config(), fakes.collaborators()).unwrap()
}
