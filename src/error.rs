// src/error.rs

/// Upstream fetch failures. These never carry partial data.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A payload arrived but did not yield a usable value.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("pool prefixes {0:?} not found")]
    NoPoolMatched(Vec<String>),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no data from {0} source")]
    NoSourceData(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("no api domain name supplied for entity {0}")]
    MissingApiDomain(String),
    #[error("no pool name supplied for entity {0}")]
    MissingPoolName(String),
    #[error("entity {entity}: {family} is only available for bitcoin")]
    UnsupportedAsset { entity: String, family: &'static str },
    #[error("invalid value for `{field}`: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("cannot read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("template error: {0}")]
pub struct TemplateError(pub String);

/// Why a single fetch attempt inside an update tick produced nothing.
#[derive(thiserror::Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}
