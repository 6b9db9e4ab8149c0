//! Request dispatch: from a conversation to a decoded reply.
//!
//! [`ChatPipeline`] wires the pieces together for one request:
//!
//! ```text
//! history ─▶ resolve limit ─▶ system prompt ─▶ retrieved context ─▶ assemble
//!                                                                      │
//!                         StreamDecoder ◀── POST /api/generate ◀───────┘
//! ```
//!
//! Setup problems (no backend, no model, empty history) are detected before
//! any network call. On the streaming path they come back as a single fatal
//! event; on the non-streaming path as a [`PipelineError`].

use crate::assemble::{AssembledPrompt, PromptAssembler};
use crate::backend::{Backend, GenerateRequest, Generator, ModelMetadataSource, OllamaClient};
use crate::config::PromptlineConfig;
use crate::context::{ContextContentCache, ContextProvider, compose_system_prompt};
use crate::errors::{BackendError, PipelineError};
use crate::limits::ContextLimitResolver;
use crate::stream::StreamDecoder;
use crate::summarize::Summarizer;
use promptline_common::{ChatSettings, Message, Role, StreamEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

/// Everything sent for one request, before dispatch.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub system_prompt: String,
    pub retrieved_context: String,
    pub assembled: AssembledPrompt,
}

impl PreparedRequest {
    pub fn to_generate_request(&self, settings: &ChatSettings) -> GenerateRequest {
        GenerateRequest::new(&settings.model, self.assembled.prompt.clone())
            .system(self.system_prompt.clone())
            .temperature(settings.temperature)
            .context_size(self.assembled.effective_limit)
    }
}

pub struct ChatPipeline {
    config: PromptlineConfig,
    generator: Option<Arc<dyn Generator>>,
    resolver: Arc<ContextLimitResolver>,
    assembler: PromptAssembler,
    context_provider: Option<Arc<dyn ContextProvider>>,
    content_cache: ContextContentCache,
}

impl ChatPipeline {
    /// A pipeline without a backend. Prompts can be assembled against the
    /// configured limits; dispatch fails with [`PipelineError::NoBackend`].
    pub fn new(config: PromptlineConfig) -> Self {
        Self::build(config, None, Arc::new(ContextLimitResolver::offline()), Summarizer::disabled())
    }

    pub fn with_backend<B: Backend + 'static>(config: PromptlineConfig, backend: Arc<B>) -> Self {
        let generator: Arc<dyn Generator> = backend.clone();
        let metadata: Arc<dyn ModelMetadataSource> = backend;
        let summarizer = Summarizer::new(generator.clone(), config.toml.summarization.to_options());
        Self::build(
            config,
            Some(generator),
            Arc::new(ContextLimitResolver::new(metadata)),
            summarizer,
        )
    }

    /// Connect to the configured endpoint over HTTP.
    pub fn connect(config: PromptlineConfig) -> Result<Self, BackendError> {
        let backend = &config.toml.backend;
        let client = OllamaClient::with_timeouts(
            config.endpoint(),
            backend.connect_timeout(),
            backend.request_timeout(),
        )?;
        Ok(Self::with_backend(config, Arc::new(client)))
    }

    fn build(
        config: PromptlineConfig,
        generator: Option<Arc<dyn Generator>>,
        resolver: Arc<ContextLimitResolver>,
        summarizer: Summarizer,
    ) -> Self {
        let assembler = PromptAssembler::new(
            resolver.clone(),
            summarizer,
            config.toml.defaults.measurer.build(),
            config.toml.assembly_limits(),
        );
        Self {
            config,
            generator,
            resolver,
            assembler,
            context_provider: None,
            content_cache: ContextContentCache::new(),
        }
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    pub fn config(&self) -> &PromptlineConfig {
        &self.config
    }

    /// Settings for `model` from configuration and matching overrides.
    pub fn settings_for(&self, model: &str) -> ChatSettings {
        self.config.settings_for(model)
    }

    /// Effective context limit for `model`; `user_limit` defaults to the
    /// configured one.
    pub async fn effective_limit(&self, model: &str, user_limit: Option<usize>) -> usize {
        let user_limit = user_limit.unwrap_or_else(|| self.assembler.limits().default_context_limit);
        self.resolver.resolve(model, user_limit).await
    }

    /// Context length reported by the backend for `model`, if any.
    pub async fn detected_limit(&self, model: &str) -> Option<usize> {
        self.resolver.detected_limit(model).await
    }

    pub fn system_prompt(&self, settings: &ChatSettings) -> String {
        let role_text = self
            .config
            .role_file()
            .and_then(|path| self.content_cache.role_text(&path));
        let now = self
            .config
            .toml
            .prompt
            .include_timestamp
            .then(chrono::Local::now);
        compose_system_prompt(settings.system_prompt.as_deref(), role_text.as_deref(), now)
    }

    async fn retrieved_context(&self, history: &[Message]) -> String {
        let Some(provider) = &self.context_provider else {
            return String::new();
        };
        let latest_user_text = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        self.content_cache
            .context_for(provider.as_ref(), latest_user_text)
            .await
    }

    /// Compose, retrieve, and assemble without dispatching.
    pub async fn prepare(&self, history: &[Message], settings: &ChatSettings) -> PreparedRequest {
        let system_prompt = self.system_prompt(settings);
        let retrieved_context = self.retrieved_context(history).await;
        let assembled = self
            .assembler
            .assemble_with_budget(history, settings, &system_prompt, &retrieved_context)
            .await;
        PreparedRequest {
            system_prompt,
            retrieved_context,
            assembled,
        }
    }

    fn check_setup(&self, history: &[Message], settings: &ChatSettings) -> Result<Arc<dyn Generator>, PipelineError> {
        let generator = self.generator.clone().ok_or(PipelineError::NoBackend)?;
        if settings.model.trim().is_empty() {
            return Err(PipelineError::MissingModel);
        }
        if history.is_empty() {
            return Err(PipelineError::EmptyHistory);
        }
        Ok(generator)
    }

    /// Stream a reply to the last message in `history`.
    ///
    /// Never fails: every problem surfaces as the decoder's terminal event.
    pub async fn stream_reply(
        &self,
        history: &[Message],
        settings: &ChatSettings,
        cancel: CancellationToken,
    ) -> StreamDecoder {
        let generator = match self.check_setup(history, settings) {
            Ok(generator) => generator,
            Err(e) => return StreamDecoder::failed(StreamEvent::fatal(e.to_string())),
        };

        let request_id = Uuid::new_v4();
        let span = info_span!("stream_reply", %request_id, model = %settings.model);
        async move {
            let prepared = self.prepare(history, settings).await;
            if cancel.is_cancelled() {
                return StreamDecoder::failed(StreamEvent::non_fatal(crate::stream::CANCELLED_MESSAGE));
            }

            let request = prepared.to_generate_request(settings).streaming(true);
            debug!(
                prompt_chars = request.prompt.len(),
                num_ctx = prepared.assembled.effective_limit,
                "dispatching"
            );
            // The server may hold the response until the model is loaded.
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("generation cancelled while waiting for response");
                    return StreamDecoder::failed(StreamEvent::non_fatal(crate::stream::CANCELLED_MESSAGE));
                }
                response = generator.generate_stream(&request) => response,
            };
            match response {
                Ok(body) => StreamDecoder::new(body, cancel),
                Err(e) => {
                    warn!(error = %e, "generation request failed");
                    StreamDecoder::failed(StreamEvent::fatal(e.to_string()))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Complete reply text, without streaming.
    pub async fn complete(&self, history: &[Message], settings: &ChatSettings) -> Result<String, PipelineError> {
        let generator = self.check_setup(history, settings)?;

        let request_id = Uuid::new_v4();
        let span = info_span!("complete", %request_id, model = %settings.model);
        async move {
            let prepared = self.prepare(history, settings).await;
            let request = prepared.to_generate_request(settings);
            let response = generator.generate(&request).await?;
            Ok::<_, PipelineError>(response.response)
        }
        .instrument(span)
        .await
    }

    pub fn clear_model_limit_cache(&self) {
        self.resolver.clear_cache();
    }

    pub fn clear_context_content_cache(&self) {
        self.content_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ByteStream, GenerateResponse, ModelDetails};
    use crate::config::PromptlineToml;
    use crate::context::StaticContext;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        requests: Mutex<Vec<GenerateRequest>>,
        show_calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for FakeBackend {
        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(GenerateResponse {
                response: "Paris.".to_string(),
                done: true,
                ..Default::default()
            })
        }

        async fn generate_stream(&self, request: &GenerateRequest) -> Result<ByteStream, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            let lines: Vec<Result<Vec<u8>, BackendError>> = vec![
                Ok(b"{\"response\":\"Par\",\"done\":false}\n".to_vec()),
                Ok(b"{\"response\":\"is.\",\"done\":true}\n".to_vec()),
            ];
            Ok(futures::stream::iter(lines).boxed())
        }

        fn endpoint(&self) -> &str {
            "fake"
        }
    }

    #[async_trait]
    impl ModelMetadataSource for FakeBackend {
        async fn model_details(&self, _model: &str) -> Result<Option<ModelDetails>, BackendError> {
            self.show_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ModelDetails {
                parameters: Some("num_ctx 4096".to_string()),
                model_info: Default::default(),
            }))
        }
    }

    fn config() -> PromptlineConfig {
        let mut toml = PromptlineToml::default();
        toml.prompt.include_timestamp = false;
        toml.defaults.measurer = crate::measure::MeasurerKind::Words;
        PromptlineConfig::from_toml(PathBuf::from("/nonexistent"), toml)
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("What is the capital of France?"),
        ]
    }

    #[tokio::test]
    async fn test_stream_reply_sends_limit_and_temperature() {
        let backend = Arc::new(FakeBackend::default());
        let pipeline = ChatPipeline::with_backend(config(), backend.clone());
        let mut settings = pipeline.settings_for("llama3.2");
        settings.temperature = 0.3;

        let events = pipeline
            .stream_reply(&history(), &settings, CancellationToken::new())
            .await
            .collect()
            .await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::content("Par", false));

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].stream);
        assert_eq!(requests[0].options.context_size, Some(4096));
        assert!((requests[0].options.temperature - 0.3).abs() < f32::EPSILON);
        assert!(requests[0].prompt.ends_with("User: What is the capital of France?"));
        assert_eq!(
            requests[0].system.as_deref(),
            Some(crate::context::DEFAULT_SYSTEM_PROMPT)
        );
    }

    #[tokio::test]
    async fn test_setup_errors_before_any_call() {
        let backend = Arc::new(FakeBackend::default());
        let pipeline = ChatPipeline::with_backend(config(), backend.clone());

        let empty = pipeline
            .stream_reply(&[], &pipeline.settings_for("llama3.2"), CancellationToken::new())
            .await
            .collect()
            .await;
        assert_eq!(
            empty,
            vec![StreamEvent::fatal(PipelineError::EmptyHistory.to_string())]
        );

        let no_model = pipeline.complete(&history(), &ChatSettings::new("")).await;
        assert!(matches!(no_model, Err(PipelineError::MissingModel)));

        assert!(backend.requests.lock().unwrap().is_empty());
        assert_eq!(backend.show_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_backend() {
        let pipeline = ChatPipeline::new(config());
        let settings = pipeline.settings_for("llama3.2");
        let result = pipeline.complete(&history(), &settings).await;
        assert!(matches!(result, Err(PipelineError::NoBackend)));

        // assembly still works offline
        let prepared = pipeline.prepare(&history(), &settings).await;
        assert_eq!(prepared.assembled.effective_limit, 8192);
    }

    #[tokio::test]
    async fn test_complete_and_cache_clearing() {
        let backend = Arc::new(FakeBackend::default());
        let pipeline = ChatPipeline::with_backend(config(), backend.clone());
        let settings = pipeline.settings_for("llama3.2");

        assert_eq!(pipeline.complete(&history(), &settings).await.unwrap(), "Paris.");
        pipeline.complete(&history(), &settings).await.unwrap();
        assert_eq!(backend.show_calls.load(Ordering::SeqCst), 1);

        pipeline.clear_model_limit_cache();
        pipeline.complete(&history(), &settings).await.unwrap();
        assert_eq!(backend.show_calls.load(Ordering::SeqCst), 2);
        assert!(!backend.requests.lock().unwrap()[0].stream);
    }

    #[tokio::test]
    async fn test_retrieved_context_in_prompt() {
        let pipeline = ChatPipeline::with_backend(config(), Arc::new(FakeBackend::default()))
            .with_context_provider(Arc::new(StaticContext::new("France is in Europe.")));
        let settings = pipeline.settings_for("llama3.2");

        let prepared = pipeline.prepare(&history(), &settings).await;
        assert_eq!(prepared.retrieved_context, "France is in Europe.");
        assert!(
            prepared
                .assembled
                .prompt
                .starts_with("Relevant context:\nFrance is in Europe.")
        );
        pipeline.clear_context_content_cache();
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let backend = Arc::new(FakeBackend::default());
        let pipeline = ChatPipeline::with_backend(config(), backend.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let events = pipeline
            .stream_reply(&history(), &pipeline.settings_for("llama3.2"), cancel)
            .await
            .collect()
            .await;
        assert_eq!(
            events,
            vec![StreamEvent::non_fatal(crate::stream::CANCELLED_MESSAGE)]
        );
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    /// Accepts the request but never sends response headers.
    struct StalledBackend;

    #[async_trait]
    impl Generator for StalledBackend {
        async fn generate(&self, _request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
            futures::future::pending().await
        }

        async fn generate_stream(&self, _request: &GenerateRequest) -> Result<ByteStream, BackendError> {
            futures::future::pending().await
        }

        fn endpoint(&self) -> &str {
            "stalled"
        }
    }

    #[async_trait]
    impl ModelMetadataSource for StalledBackend {
        async fn model_details(&self, _model: &str) -> Result<Option<ModelDetails>, BackendError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_response() {
        let pipeline = ChatPipeline::with_backend(config(), Arc::new(StalledBackend));
        let settings = pipeline.settings_for("llama3.2");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let events = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            pipeline
                .stream_reply(&history(), &settings, cancel)
                .await
                .collect()
                .await
        })
        .await
        .expect("cancellation should end a stalled dispatch");
        assert_eq!(
            events,
            vec![StreamEvent::non_fatal(crate::stream::CANCELLED_MESSAGE)]
        );
    }

    #[test]
    fn test_system_prompt_override_wins() {
        let pipeline = ChatPipeline::new(config());
        let mut settings = pipeline.settings_for("llama3.2");
        settings.system_prompt = Some("Answer in French.".to_string());
        assert_eq!(pipeline.system_prompt(&settings), "Answer in French.");
    }
}
