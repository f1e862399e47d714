//! Vision-LLM chunk backend.
//!
//! A chunk's pages are rasterised, base64-encoded, and attached to a single
//! chat request whose system prompt carries the page-break contract
//! ([`crate::prompts::PAGE_BREAK_MARKER`]). The response is split back into
//! per-page segments with the chunk's global page offset applied.
//!
//! There is deliberately no retry loop here: retry is a whole-document
//! policy (the one-shot strategy fallback in [`crate::parse`]), and a chunk
//! failure must abort the dispatch promptly rather than stall it.

use crate::config::ParseConfig;
use crate::error::DocPipeError;
use crate::output::TokenUsage;
use crate::pipeline::backend::{segment_marked_text, ChunkOutput, ChunkParser};
use crate::pipeline::input::{self, SourceKind};
use crate::pipeline::postprocess;
use crate::pipeline::split::Chunk;
use crate::pipeline::{encode, render};
use crate::prompts::{PAGE_BREAK_MARKER, PARSER_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Chunk parser backed by a vision LLM.
pub struct LlmChunkParser {
    provider: Arc<dyn LLMProvider>,
    title: String,
    temperature: f32,
    max_tokens: usize,
    max_rendered_pixels: u32,
}

impl LlmChunkParser {
    pub fn new(provider: Arc<dyn LLMProvider>, title: impl Into<String>, config: &ParseConfig) -> Self {
        Self {
            provider,
            title: title.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }

    /// Gather the chunk's pages as image attachments.
    async fn chunk_images(&self, chunk: &Chunk) -> Result<Vec<ImageData>, DocPipeError> {
        match input::classify_or_reject(&chunk.path)? {
            SourceKind::Pdf => {
                let pages = render::render_chunk_pages(&chunk.path, self.max_rendered_pixels).await?;
                pages
                    .iter()
                    .enumerate()
                    .map(|(idx, img)| {
                        encode::encode_page(img).map_err(|e| DocPipeError::RenderFailed {
                            page: chunk.start_page + idx,
                            detail: format!("image encoding failed: {e}"),
                        })
                    })
                    .collect()
            }
            SourceKind::Image => {
                let data =
                    encode::encode_image_file(&chunk.path).map_err(|e| DocPipeError::LlmBackend {
                        start_page: chunk.start_page,
                        detail: format!("failed to read image: {e}"),
                    })?;
                Ok(vec![data])
            }
            SourceKind::Text | SourceKind::Html => Err(DocPipeError::LlmBackend {
                start_page: chunk.start_page,
                detail: "text and HTML sources use the static strategy".into(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl ChunkParser for LlmChunkParser {
    async fn parse_chunk(&self, chunk: &Chunk) -> Result<ChunkOutput, DocPipeError> {
        let start = Instant::now();
        let images = self.chunk_images(chunk).await?;

        // The image attachments carry all the content; APIs just require a
        // user turn to respond to.
        let messages = vec![
            ChatMessage::system(PARSER_PROMPT),
            ChatMessage::user_with_images("", images),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| DocPipeError::LlmBackend {
                start_page: chunk.start_page,
                detail: e.to_string(),
            })?;

        let (raw, segments) = segment_marked_text(
            &response.content,
            PAGE_BREAK_MARKER,
            &self.title,
            chunk.start_page,
            postprocess::clean_markdown,
        );

        let input = response.prompt_tokens as u64;
        let output = response.completion_tokens as u64;
        let usage = TokenUsage {
            input,
            output,
            llm_page_count: segments.len(),
            total: input + output,
        };

        debug!(
            "LLM chunk {} (pages {}-{}): {} segments, {} in / {} out tokens, {:?}",
            chunk.index,
            chunk.start_page,
            chunk.end_page,
            segments.len(),
            usage.input,
            usage.output,
            start.elapsed()
        );

        Ok(ChunkOutput { raw, segments, usage })
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. Pre-built provider on the config — used as-is (tests, middleware).
/// 2. Named provider + model — the factory reads the matching API key from
///    the environment.
/// 3. `DOCPIPE_LLM_PROVIDER` + `DOCPIPE_MODEL` env pair — lets scripts and
///    CI pick a provider without touching call sites.
/// 4. Full auto-detection from whatever API keys are present.
pub fn resolve_provider(config: &ParseConfig) -> Result<Arc<dyn LLMProvider>, DocPipeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("DOCPIPE_LLM_PROVIDER"),
        std::env::var("DOCPIPE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Some(model) = config.model.as_deref() {
        // A bare model name still needs a provider; let the factory infer it
        // from the first configured API key, preferring OpenAI.
        if std::env::var("OPENAI_API_KEY").map(|k| !k.is_empty()).unwrap_or(false) {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocPipeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                 Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocPipeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocPipeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
