//! Test infrastructure: MockSemanticClient and a fully wired Pipeline over a
//! temp-file SQLite store, so integration tests exercise the real
//! classify → plan → execute → format path with scripted semantic replies.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::pipeline::Pipeline;
use crate::state::SqliteStore;
use crate::tools::ToolExecutor;
use crate::traits::{GoalStore, PreferenceStore, SemanticClient};

// ---------------------------------------------------------------------------
// MockSemanticClient
// ---------------------------------------------------------------------------

/// Mock semantic service with three reply sources, in lookup order:
/// pattern rules (substring of the prompt — deterministic under concurrent
/// calls), then a FIFO queue, then `"{}"`. `failing()` errors every call.
pub struct MockSemanticClient {
    responses: Mutex<Vec<String>>,
    rules: Vec<(String, String)>,
    fail: bool,
    pub call_log: Mutex<Vec<String>>,
}

impl MockSemanticClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            rules: Vec::new(),
            fail: false,
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// FIFO queue of scripted replies; `"{}"` once drained.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Self::new()
        }
    }

    /// Keyed replies: the first rule whose pattern appears in the prompt
    /// wins. Use this when concurrent calls make FIFO order nondeterministic.
    pub fn with_rules(rules: Vec<(&str, &str)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(p, r)| (p.to_string(), r.to_string()))
                .collect(),
            ..Self::new()
        }
    }

    /// Every call fails, simulating a semantic-service outage.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub async fn call_count(&self) -> usize {
        self.call_log.lock().await.len()
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.call_log.lock().await.clone()
    }
}

impl Default for MockSemanticClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticClient for MockSemanticClient {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> anyhow::Result<String> {
        self.call_log.lock().await.push(prompt.to_string());

        if self.fail {
            anyhow::bail!("semantic service unavailable (mock)");
        }
        for (pattern, response) in &self.rules {
            if prompt.contains(pattern) {
                return Ok(response.clone());
            }
        }
        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            Ok("{}".to_string())
        } else {
            Ok(responses.remove(0))
        }
    }
}

// ---------------------------------------------------------------------------
// TestHarness
// ---------------------------------------------------------------------------

/// A wired pipeline plus direct handles to its collaborators.
pub struct TestHarness {
    pub pipeline: Pipeline,
    pub store: Arc<SqliteStore>,
    pub semantic: Arc<MockSemanticClient>,
    executor: ToolExecutor,
    /// Keep the temp file alive — DB is deleted when this drops.
    _db_file: tempfile::NamedTempFile,
}

impl TestHarness {
    pub fn goals(&self) -> Arc<dyn GoalStore> {
        self.store.clone()
    }

    pub fn prefs(&self) -> Arc<dyn PreferenceStore> {
        self.store.clone()
    }

    pub fn semantic_client(&self) -> Arc<dyn SemanticClient> {
        self.semantic.clone()
    }

    /// A standalone executor sharing the harness stores (and its own cache).
    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }
}

/// Build a pipeline over a mock semantic client and a temp-file SQLite DB.
/// Each call creates an isolated database, so tests can run in parallel.
pub async fn setup_test_pipeline(mock: MockSemanticClient) -> anyhow::Result<TestHarness> {
    let db_file = tempfile::NamedTempFile::new()?;
    let db_path = db_file.path().to_str().unwrap().to_string();

    let store = Arc::new(SqliteStore::connect(&db_path).await?);
    let semantic = Arc::new(mock);

    let pipeline = Pipeline::new(
        semantic.clone() as Arc<dyn SemanticClient>,
        store.clone() as Arc<dyn GoalStore>,
        store.clone() as Arc<dyn PreferenceStore>,
    );
    let executor = ToolExecutor::new(
        store.clone() as Arc<dyn GoalStore>,
        store.clone() as Arc<dyn PreferenceStore>,
        semantic.clone() as Arc<dyn SemanticClient>,
    );

    Ok(TestHarness {
        pipeline,
        store,
        semantic,
        executor,
        _db_file: db_file,
    })
}
