pub mod config;
pub mod schema;
pub mod types;

pub use config::{
    Config, ConfigError, IoConfig, ProviderConfig, SecurityConfig, StorageConfig, ThresholdPolicy,
};
pub use schema::{FieldKind, FieldSchema, SchemaError};
pub use types::{
    AttributeRecord, ContentPart, Decision, FieldFlag, FieldValue, ImageSource, Item, ListItem,
    Message, Provenance, Usage, VlmRequest, VlmResponse,
};
