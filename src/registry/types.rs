//! Wire types for the Confluent Schema Registry REST API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Schema serialization format understood by the registry.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    #[default]
    Avro,
    Json,
    Protobuf,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchemaType::Avro => "AVRO",
            SchemaType::Json => "JSON",
            SchemaType::Protobuf => "PROTOBUF",
        };
        f.write_str(s)
    }
}

impl FromStr for SchemaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVRO" => Ok(SchemaType::Avro),
            "JSON" => Ok(SchemaType::Json),
            "PROTOBUF" => Ok(SchemaType::Protobuf),
            other => Err(format!("unknown schema type: {other}")),
        }
    }
}

/// Registry operating mode.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
pub enum Mode {
    #[default]
    #[serde(rename = "READWRITE")]
    ReadWrite,
    #[serde(rename = "READONLY")]
    ReadOnly,
    #[serde(rename = "IMPORT")]
    Import,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::ReadWrite => "READWRITE",
            Mode::ReadOnly => "READONLY",
            Mode::Import => "IMPORT",
        };
        f.write_str(s)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READWRITE" => Ok(Mode::ReadWrite),
            "READONLY" => Ok(Mode::ReadOnly),
            "IMPORT" => Ok(Mode::Import),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Subject/global compatibility level.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    #[default]
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
    None,
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompatibilityLevel::Backward => "BACKWARD",
            CompatibilityLevel::BackwardTransitive => "BACKWARD_TRANSITIVE",
            CompatibilityLevel::Forward => "FORWARD",
            CompatibilityLevel::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityLevel::Full => "FULL",
            CompatibilityLevel::FullTransitive => "FULL_TRANSITIVE",
            CompatibilityLevel::None => "NONE",
        };
        f.write_str(s)
    }
}

/// One registered schema version as delivered by
/// `GET /subjects/{subject}/versions/{version}`.
///
/// The body stays an opaque string; this crate never parses schemas.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SchemaRecord {
    pub subject: String,
    pub id: i64,
    pub version: i32,
    #[serde(default, rename = "schemaType")]
    pub schema_type: SchemaType,
    pub schema: String,
}

/// Body of `POST /subjects/{subject}/versions`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterSchemaRequest {
    pub schema: String,
    #[serde(rename = "schemaType")]
    pub schema_type: SchemaType,
    /// Only honored when the registry is in IMPORT mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Required alongside `id` on some registry versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredId {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: Mode,
}

/// `GET /config` response; the field name differs between read and write.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigBody {
    #[serde(alias = "compatibilityLevel", alias = "compatibility")]
    pub compatibility_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigUpdateBody {
    pub compatibility: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompatibilityCheckBody {
    pub is_compatible: bool,
}

/// Result of probing one registry endpoint. Errors are values here.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ConnectionTest {
    pub status: ConnectionStatus,
    pub registry: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Error,
}
