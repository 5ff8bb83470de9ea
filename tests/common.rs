// ABOUTME: Shared test utilities and fakes for integration tests
// ABOUTME: Provides logging setup, config fixtures, scripted LLM providers and in-memory connectors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `smart_insights`
//!
//! Fakes stand in for the network-facing pieces: [`ScriptedProvider`] replays
//! canned completions and [`FakeConnector`] serves a fixed schema and rows.
//! [`TestHarness`] wires them into real `ServerResources`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use smart_insights::{
    config::ServerConfig,
    errors::{AppError, AppResult, ConfigKind, ProviderError, ResolveError},
    llm::{ChatRequest, ChatResponse, LlmProvider, LlmProviderRegistry, ProviderConfig},
    models::{
        AssistantRequest, AssistantRequestOptions, AssistantResponse, DatabaseConfig,
        DatabaseType, LlmConfig, LlmProviderKind, ResponseStatus,
    },
    server::ServerResources,
    services::AssistantService,
    sources::{
        ColumnInfo, Connector, DatabaseSchema, QueryResult, SourceResolver, TableInfo,
    },
    storage::{ConfigStore, MemoryStorage, ResponseStore, StorageHandles},
};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

pub const DB_NAME: &str = "sales_db";
pub const LLM_PROVIDER: &str = "openai";
pub const LLM_CONFIG: &str = "default";

pub const TOP_PRODUCTS_SQL: &str =
    "select name, sum(qty) from products group by name order by 2 desc limit 5";
pub const TOP_PRODUCTS_REPORT: &str = "# Top Products\n\nWidgets lead with 120 units.";

pub fn database_config(name: &str) -> DatabaseConfig {
    DatabaseConfig {
        name: name.to_owned(),
        db_type: DatabaseType::PostgreSql,
        host: "localhost".to_owned(),
        port: "5432".to_owned(),
        db_name: "sales".to_owned(),
        username: "reader".to_owned(),
        password: "secret".to_owned(),
        options: Map::new(),
    }
}

pub fn llm_config(provider: LlmProviderKind, name: &str) -> LlmConfig {
    LlmConfig {
        name: name.to_owned(),
        provider,
        api_key: "sk-test".to_owned(),
        model: "test-model".to_owned(),
        options: Map::new(),
    }
}

pub fn ask_request(db_configuration_name: &str, question: &str) -> AssistantRequest {
    AssistantRequest {
        db_configuration_name: db_configuration_name.to_owned(),
        question: question.to_owned(),
        options: AssistantRequestOptions {
            llm_provider: LLM_PROVIDER.to_owned(),
            llm_config: LLM_CONFIG.to_owned(),
        },
    }
}

pub fn sql_reply(sql: &str) -> String {
    format!("Here is the query:\n<sql>\n{sql}\n</sql>")
}

pub fn markdown_reply(markdown: &str) -> String {
    format!("<markdown>\n{markdown}\n</markdown>")
}

pub fn products_schema() -> DatabaseSchema {
    let column = |name: &str, data_type: &str| ColumnInfo {
        name: name.to_owned(),
        data_type: data_type.to_owned(),
        nullable: false,
        default: None,
        char_max_length: None,
        description: None,
    };
    let mut products = TableInfo::new(
        "products",
        vec![column("id", "integer"), column("name", "text"), column("qty", "integer")],
    );
    products.primary_key = vec!["id".to_owned()];
    DatabaseSchema {
        tables: vec![products, TableInfo::new("orders", vec![column("id", "integer")])],
        views: Vec::new(),
    }
}

pub fn product_rows(count: usize) -> QueryResult {
    let rows = (0..count)
        .map(|i| {
            let mut row = Map::new();
            row.insert("name".to_owned(), Value::from(format!("product-{i}")));
            row.insert("sum".to_owned(), Value::from(100 - i));
            row
        })
        .collect();
    QueryResult {
        columns: vec!["name".to_owned(), "sum".to_owned()],
        rows,
    }
}

// ============================================================================
// Scripted LLM provider
// ============================================================================

/// Shared script of replies plus a record of what the providers saw
#[derive(Clone, Default)]
pub struct LlmScript {
    replies: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    closed: Arc<AtomicUsize>,
    created: Arc<AtomicUsize>,
}

impl LlmScript {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ProviderError>>,
    {
        let script = Self::default();
        script.replies.lock().unwrap().extend(replies);
        script
    }

    /// SQL reply followed by report reply, repeated `times`
    pub fn happy_path(times: usize) -> Self {
        Self::new((0..times).flat_map(|_| {
            [
                Ok(sql_reply(TOP_PRODUCTS_SQL)),
                Ok(markdown_reply(TOP_PRODUCTS_REPORT)),
            ]
        }))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn provider(&self) -> Box<dyn LlmProvider> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedProvider {
            script: self.clone(),
            initialized: false,
        })
    }
}

/// Provider that replays an [`LlmScript`]
pub struct ScriptedProvider {
    script: LlmScript,
    initialized: bool,
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), ProviderError> {
        config.require_credentials(self.name())?;
        self.initialized = true;
        Ok(())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if !self.initialized {
            return Err(ProviderError::NotInitialized {
                provider: self.name().to_owned(),
            });
        }
        self.script.requests.lock().unwrap().push(request.clone());
        let reply = self
            .script
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))?;
        Ok(ChatResponse {
            content: reply,
            model: "test-model".to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn close(&mut self) {
        self.script.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry whose `openai` kind is served by the script
pub fn scripted_registry(store: Arc<dyn ConfigStore>, script: &LlmScript) -> LlmProviderRegistry {
    let script = script.clone();
    LlmProviderRegistry::new(store, 3000)
        .with_factory(LlmProviderKind::OpenAi, move || script.provider())
}

// ============================================================================
// Fake connector and resolver
// ============================================================================

/// What a [`FakeConnector`] does when asked for rows
#[derive(Clone)]
pub enum QueryBehavior {
    Rows(QueryResult),
    Fail(String),
    Panic,
}

/// In-memory connector that tracks concurrent use
#[derive(Clone)]
pub struct FakeConnector {
    schema: Result<DatabaseSchema, String>,
    query: QueryBehavior,
    delay: Duration,
    executed: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(schema: DatabaseSchema, rows: QueryResult) -> Self {
        Self {
            schema: Ok(schema),
            query: QueryBehavior::Rows(rows),
            delay: Duration::ZERO,
            executed: Arc::default(),
            active: Arc::default(),
            max_active: Arc::default(),
        }
    }

    pub fn products() -> Self {
        Self::new(products_schema(), product_rows(5))
    }

    #[must_use]
    pub fn with_schema_error(mut self, message: &str) -> Self {
        self.schema = Err(message.to_owned());
        self
    }

    #[must_use]
    pub fn with_query(mut self, behavior: QueryBehavior) -> Self {
        self.query = behavior;
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Highest number of runs seen inside the connector at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn get_schema(&self) -> AppResult<DatabaseSchema> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.schema.clone().map_err(AppError::database)
    }

    async fn execute_query(&self, sql: &str) -> AppResult<QueryResult> {
        self.executed.lock().unwrap().push(sql.to_owned());
        match &self.query {
            QueryBehavior::Rows(rows) => Ok(rows.clone()),
            QueryBehavior::Fail(message) => Err(AppError::database(message.clone())),
            QueryBehavior::Panic => panic!("connector exploded"),
        }
    }
}

/// Resolver over a fixed name-to-connector map
#[derive(Default)]
pub struct FakeSourceResolver {
    connectors: HashMap<String, FakeConnector>,
    closed: AtomicUsize,
}

impl FakeSourceResolver {
    pub fn with(name: &str, connector: FakeConnector) -> Self {
        let mut resolver = Self::default();
        resolver.connectors.insert(name.to_owned(), connector);
        resolver
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceResolver for FakeSourceResolver {
    async fn resolve(&self, name: &str) -> Result<Arc<dyn Connector>, ResolveError> {
        self.connectors
            .get(name)
            .map(|c| Arc::new(c.clone()) as Arc<dyn Connector>)
            .ok_or_else(|| ResolveError::ConfigNotFound {
                kind: ConfigKind::Database,
                name: name.to_owned(),
            })
    }

    async fn close_all(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Memory-backed response store that can refuse the write completing a run
pub struct FlakyResponses {
    inner: Arc<MemoryStorage>,
    failing_completions: AtomicUsize,
}

impl FlakyResponses {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            failing_completions: AtomicUsize::new(0),
        }
    }

    /// Fail the next `times` saves that would mark a response `completed`
    pub fn fail_completions(&self, times: usize) {
        self.failing_completions.store(times, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResponseStore for FlakyResponses {
    async fn insert_response(&self, response: &AssistantResponse) -> AppResult<()> {
        self.inner.insert_response(response).await
    }

    async fn load_response(&self, id: Uuid) -> AppResult<Option<AssistantResponse>> {
        self.inner.load_response(id).await
    }

    async fn save_response(&self, response: &AssistantResponse) -> AppResult<()> {
        if response.status == ResponseStatus::Completed
            && self
                .failing_completions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(AppError::database("database is locked"));
        }
        self.inner.save_response(response).await
    }

    async fn list_responses(&self) -> AppResult<Vec<AssistantResponse>> {
        self.inner.list_responses().await
    }
}

/// Real server resources around fake sources and a scripted LLM
pub struct TestHarness {
    pub resources: Arc<ServerResources>,
    pub storage: Arc<MemoryStorage>,
    pub responses: Arc<FlakyResponses>,
    pub sources: Arc<FakeSourceResolver>,
    pub script: LlmScript,
}

impl TestHarness {
    pub async fn new(sources: FakeSourceResolver, script: LlmScript) -> Self {
        Self::with_limit(sources, script, 4).await
    }

    pub async fn with_limit(sources: FakeSourceResolver, script: LlmScript, limit: usize) -> Self {
        Self::with_config(sources, script, |config| {
            config.orchestration.max_concurrent = limit;
        })
        .await
    }

    pub async fn with_config(
        sources: FakeSourceResolver,
        script: LlmScript,
        configure: impl FnOnce(&mut ServerConfig),
    ) -> Self {
        init_test_logging();
        let storage = Arc::new(MemoryStorage::new());
        storage
            .save_llm_config(&llm_config(LlmProviderKind::OpenAi, LLM_CONFIG))
            .await
            .unwrap();

        let responses = Arc::new(FlakyResponses::new(storage.clone()));
        let handles = StorageHandles {
            configs: storage.clone(),
            responses: responses.clone(),
        };
        let llm = Arc::new(scripted_registry(handles.configs.clone(), &script));
        let sources = Arc::new(sources);

        let mut config = ServerConfig::default();
        config.orchestration.max_concurrent = 4;
        configure(&mut config);

        let resources = ServerResources::with_components(
            config,
            handles,
            sources.clone() as Arc<dyn SourceResolver>,
            llm,
        )
        .unwrap();

        Self {
            resources: Arc::new(resources),
            storage,
            responses,
            sources,
            script,
        }
    }

    pub fn assistant(&self) -> &AssistantService {
        &self.resources.assistant
    }
}

/// Poll until the response leaves `in_progress`
pub async fn wait_for_terminal(assistant: &AssistantService, id: Uuid) -> AssistantResponse {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = assistant.get(id).await.unwrap();
            if response.status.is_terminal() {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("orchestration did not reach a terminal status")
}
