use std::sync::Arc;

use chrono::Utc;
use retrova_core::{ChatMessage, Payload, RetrovaError, RetrovaResult, Role};
use retrova_model::{CompletionBackend, CompletionEvent, CompletionRequest, EmbeddingProvider};
use retrova_retrieval::RetrievalEngine;
use retrova_store::VectorStore;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::prompts::{self, SYSTEM_PROMPT};
use crate::trimmer;

/// Chat service configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Collection holding ingested document chunks.
    pub document_collection: String,
    /// Collection holding conversation turns.
    pub chat_collection: String,
    /// Candidate count for the context search.
    pub top_k: usize,
    /// Similarity threshold for the context search.
    pub score_threshold: f32,
    /// Language tag selecting the token budget.
    pub language: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            document_collection: "retrova_documents".to_string(),
            chat_collection: "retrova_chat_history".to_string(),
            top_k: 5,
            score_threshold: 0.5,
            language: "en".to_string(),
        }
    }
}

/// Answers user queries with retrieved context and streams the completion.
///
/// History is persisted only after a full response is assembled: a caller
/// abandoning the stream mid-flight leaves no partial conversation record.
pub struct ChatService {
    store: Arc<VectorStore>,
    engine: Arc<RetrievalEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionBackend>,
    config: ChatConfig,
}

impl ChatService {
    /// Creates a chat service with the default configuration.
    pub fn new(
        store: Arc<VectorStore>,
        engine: Arc<RetrievalEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            store,
            engine,
            embedder,
            completion,
            config: ChatConfig::default(),
        }
    }

    /// Overrides the configuration. Chainable.
    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Answers `query` for a session, streaming [`CompletionEvent`]s.
    ///
    /// The join handle resolves to the full answer text once the stream has
    /// finished and both conversation turns are persisted.
    pub async fn answer(
        &self,
        query: &str,
        session_id: &str,
        model: &str,
    ) -> RetrovaResult<(mpsc::Receiver<CompletionEvent>, JoinHandle<RetrovaResult<String>>)>
    {
        let records = self
            .engine
            .semantic_search(
                query,
                &self.config.document_collection,
                self.config.top_k,
                self.config.score_threshold,
                None,
            )
            .await?;
        let context: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        let context = context.join("\n");
        info!(session_id, records = records.len(), "retrieved answer context");

        let history = self.engine.chat_history(session_id).await?;
        let user_message = prompts::render_user_message(&context, query);
        let trimmed = trimmer::trim_history(
            &ChatMessage::system(SYSTEM_PROMPT),
            &history,
            &ChatMessage::user(user_message.clone()),
            &self.config.language,
        );

        let request = CompletionRequest {
            message: user_message,
            model: model.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            history: trimmed,
        };
        let (mut backend_rx, backend_handle) = self.completion.chat_stream(&request).await?;

        let (tx, rx) = mpsc::channel::<CompletionEvent>(256);
        let store = self.store.clone();
        let embedder = self.embedder.clone();
        let chat_collection = self.config.chat_collection.clone();
        let session = session_id.to_string();
        let query = query.to_string();

        let handle = tokio::spawn(async move {
            while let Some(event) = backend_rx.recv().await {
                let _ = tx.send(event).await;
            }
            let answer = backend_handle
                .await
                .map_err(|e| RetrovaError::Completion(e.to_string()))??;

            // Only now, with the stream fully assembled, do the turns land
            // in storage. Cancellation above this point writes nothing.
            persist_turn(&store, embedder.as_ref(), &chat_collection, &session, Role::User, &query)
                .await?;
            persist_turn(
                &store,
                embedder.as_ref(),
                &chat_collection,
                &session,
                Role::Assistant,
                &answer,
            )
            .await?;

            Ok(answer)
        });

        Ok((rx, handle))
    }

    /// Stores a single conversation turn with a fresh random id.
    pub async fn save_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> RetrovaResult<()> {
        persist_turn(
            &self.store,
            self.embedder.as_ref(),
            &self.config.chat_collection,
            session_id,
            role,
            content,
        )
        .await
    }

    /// Deletes all sessions, or every turn of one session, returning how
    /// many points were removed.
    pub async fn clear_sessions(&self, session_id: Option<&str>) -> RetrovaResult<usize> {
        let collection = self
            .store
            .get_or_create_collection(&self.config.chat_collection, self.embedder.dimension())
            .await?;

        match session_id {
            None => collection.delete_all().await,
            Some(session) => {
                let mut removed = 0;
                for point in collection.query_all().await? {
                    if point.payload_str("session_id") == Some(session) {
                        collection.delete(&point.id).await?;
                        removed += 1;
                    }
                }
                Ok(removed)
            }
        }
    }
}

/// Conversation turns have no natural dedup key, so each gets a random uuid.
async fn persist_turn(
    store: &VectorStore,
    embedder: &dyn EmbeddingProvider,
    chat_collection: &str,
    session_id: &str,
    role: Role,
    content: &str,
) -> RetrovaResult<()> {
    let collection = store
        .get_or_create_collection(chat_collection, embedder.dimension())
        .await?;
    let embedding = embedder.embed_one(content).await?;

    let mut payload = Payload::new();
    payload.insert("session_id".to_string(), json!(session_id));
    payload.insert("role".to_string(), serde_json::to_value(role)?);
    payload.insert("content".to_string(), json!(content));
    payload.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));

    collection
        .upsert(Uuid::new_v4().to_string(), embedding, payload)
        .await
}
