//! End-to-end orchestration: ingest, prompt, predict, parse, decide, store.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use snapattr_core::{AttributeRecord, Config, Decision, FieldSchema, Item, ProviderConfig};
use snapattr_ingest::FsIngestor;
use snapattr_parse::{ResponseParser, decide};
use snapattr_provider::{PromptBuilder, Provider, create_provider};
use snapattr_store::{Store, StoreError, create_store};

/// Outcome of one item's run through the pipeline. Failures are
/// captured here rather than propagated so a batch can keep going.
pub struct PipelineResult {
    pub item_id: String,
    pub success: bool,
    pub attributes: Option<AttributeRecord>,
    pub decision: Option<Decision>,
    pub error: Option<String>,
    pub processing_time_ms: f64,
}

pub struct Pipeline {
    config: Config,
    provider_config: ProviderConfig,
    model: String,
    schema: FieldSchema,
    ingestor: FsIngestor,
    prompt_builder: PromptBuilder,
    provider: Box<dyn Provider>,
    parser: ResponseParser,
    store: Box<dyn Store>,
}

impl Pipeline {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        anyhow::ensure!(
            config.ingestor == "ingest.fs",
            "unsupported ingestor: {}",
            config.ingestor
        );

        let schema = FieldSchema::load(&config.schema_path)
            .with_context(|| format!("loading schema {}", config.schema_path.display()))?;
        let prompt_builder = PromptBuilder::from_file(&config.prompt_template)?;

        let provider_name = config.provider_name().to_string();
        let provider_config = config.provider_config(&provider_name);
        let provider = create_provider(&provider_name, &provider_config)?;
        let model = match &provider_config.model {
            Some(model) => model.clone(),
            None => provider
                .available_models()
                .first()
                .copied()
                .ok_or_else(|| anyhow::anyhow!("provider {provider_name} exposes no models"))?
                .to_string(),
        };

        let ingestor = FsIngestor::new(&config.io, config.security.strip_exif);
        let store = create_store(config.storage_name(), &config.storage_config)?;

        info!(
            provider = %provider_name,
            model = %model,
            storage = config.storage_name(),
            fields = schema.len(),
            "pipeline ready"
        );
        Ok(Self {
            config,
            provider_config,
            model,
            schema,
            ingestor,
            prompt_builder,
            provider,
            parser: ResponseParser::new(),
            store,
        })
    }

    /// Run one input through the full pipeline. Errors become part of
    /// the result instead of aborting the caller.
    pub async fn analyze_item(&self, input: &Path) -> PipelineResult {
        let start = Instant::now();
        let mut item_id = None;
        let outcome = self.run_item(input, &mut item_id).await;
        let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        let item_id = item_id.unwrap_or_else(|| "unknown".to_string());

        match outcome {
            Ok((attributes, decision)) => {
                info!(
                    item_id = %item_id,
                    accepted = decision.accepted,
                    confidence = format!("{:.3}", decision.confidence_score),
                    processing_time_ms = format!("{processing_time_ms:.1}"),
                    "analysis complete"
                );
                PipelineResult {
                    item_id,
                    success: true,
                    attributes: Some(attributes),
                    decision: Some(decision),
                    error: None,
                    processing_time_ms,
                }
            }
            Err(err) => {
                let error = format!("{err:#}");
                warn!(item_id = %item_id, input = %input.display(), error = %error, "analysis failed");
                PipelineResult {
                    item_id,
                    success: false,
                    attributes: None,
                    decision: None,
                    error: Some(error),
                    processing_time_ms,
                }
            }
        }
    }

    /// Run inputs sequentially; one failure never stops the batch.
    pub async fn analyze_batch(&self, inputs: &[PathBuf]) -> Vec<PipelineResult> {
        info!(items = inputs.len(), "starting batch analysis");
        let mut results = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            debug!(item = index + 1, total = inputs.len(), input = %input.display(), "processing");
            results.push(self.analyze_item(input).await);
        }
        let successful = results.iter().filter(|result| result.success).count();
        info!(successful, total = results.len(), "batch analysis complete");
        results
    }

    async fn run_item(
        &self,
        input: &Path,
        item_id: &mut Option<String>,
    ) -> anyhow::Result<(AttributeRecord, Decision)> {
        let item = self.ingestor.load(input)?;
        *item_id = Some(item.item_id.clone());
        debug!(item_id = %item.item_id, images = item.images.len(), "ingested item");

        let request =
            self.prompt_builder
                .build_request(&item, &self.schema, &self.model, &self.provider_config);
        debug!(
            model = %request.model,
            estimated_cost_usd = self.provider.estimate_cost(&request),
            "sending request"
        );

        let response = self.provider.predict(&request).await?;
        info!(
            provider = %response.provider,
            latency_ms = format!("{:.0}", response.latency_ms),
            total_tokens = response.usage.total_tokens,
            "received response"
        );

        let attributes = self.parser.parse(&response, &self.schema)?;
        let decision = decide(&attributes, &self.config.thresholds);

        self.store_results(&item, &attributes, &response, &decision)?;
        Ok((attributes, decision))
    }

    fn store_results(
        &self,
        item: &Item,
        attributes: &AttributeRecord,
        response: &snapattr_core::VlmResponse,
        decision: &Decision,
    ) -> Result<(), StoreError> {
        let metadata = serde_json::json!({ "decision": decision });
        self.store
            .store_attributes(&item.item_id, attributes, &metadata)?;
        self.store
            .store_raw_response(&item.item_id, response, &metadata)?;

        let lineage = serde_json::json!({
            "pipeline_version": env!("CARGO_PKG_VERSION"),
            "config": {
                "provider": self.config.provider,
                "model": response.model,
                "schema_path": self.config.schema_path,
            },
            "processing": {
                "images_processed": item.images.len(),
                "decision": decision,
            },
        });
        self.store.store_lineage(
            &item.item_id,
            &lineage,
            &serde_json::json!({ "timestamp": Utc::now().to_rfc3339() }),
        )?;
        Ok(())
    }
}
