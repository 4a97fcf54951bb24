//! Template-driven prompt construction.
//!
//! The template is plain text with `{{placeholder}}` markers. Supported
//! placeholders: `{{item_id}}`, `{{num_images}}`, `{{schema_description}}`,
//! `{{example_output}}`. Unknown markers are left as-is.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use tracing::debug;

use snapattr_core::{
    ContentPart, FieldKind, FieldSchema, ImageSource, Item, Message, ProviderConfig, VlmRequest,
};

use crate::ProviderError;

/// Builds [`VlmRequest`]s from a prompt template and a field schema.
#[derive(Debug)]
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ProviderError> {
        let template = std::fs::read_to_string(path).map_err(|source| ProviderError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { template })
    }

    /// Render the prompt and wrap it with the item's images into a
    /// single user message.
    pub fn build_request(
        &self,
        item: &Item,
        schema: &FieldSchema,
        model: &str,
        config: &ProviderConfig,
    ) -> VlmRequest {
        let prompt = self
            .template
            .replace("{{item_id}}", &item.item_id)
            .replace("{{num_images}}", &item.images.len().to_string())
            .replace("{{schema_description}}", &schema_description(schema))
            .replace("{{example_output}}", &example_output(schema));

        let mut content = Vec::with_capacity(1 + item.images.len());
        content.push(ContentPart::Text { text: prompt });
        for image in &item.images {
            content.push(ContentPart::ImageUrl {
                image_url: image_url(image),
            });
        }
        debug!(
            item_id = %item.item_id,
            images = item.images.len(),
            model,
            "built request"
        );

        VlmRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// One description line per schema field.
fn schema_description(schema: &FieldSchema) -> String {
    schema
        .iter()
        .map(|(name, kind)| {
            let shape = match kind {
                FieldKind::Scalar => "single value",
                FieldKind::List => "list of items",
                FieldKind::Freeform => "text string",
            };
            format!("- {name}: {shape}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Example response JSON in schema field order.
fn example_output(schema: &FieldSchema) -> String {
    let mut example: IndexMap<&str, serde_json::Value> = IndexMap::new();
    for (name, kind) in schema.iter() {
        let value = match kind {
            FieldKind::Scalar => serde_json::json!({
                "value": "example_value",
                "confidence": 0.85
            }),
            FieldKind::List => serde_json::json!([
                {"name": "example_item", "confidence": 0.80},
                {"name": "another_item", "confidence": 0.75}
            ]),
            FieldKind::Freeform => serde_json::json!("example text"),
        };
        example.insert(name, value);
    }
    // IndexMap serialization cannot fail for string keys.
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

fn image_url(image: &ImageSource) -> String {
    match image {
        ImageSource::Bytes(bytes) => {
            format!("data:image/jpeg;base64,{}", BASE64.encode(bytes))
        }
        ImageSource::Url(url) => url.clone(),
    }
}
