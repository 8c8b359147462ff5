use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("pdf parse error in {file}: {details}")]
    PdfParse { file: String, details: String },

    #[error("{file} is not valid utf-8: {source}")]
    InvalidUtf8 {
        file: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("unsupported file {file} (type {mime_type}); upload PDF or TXT")]
    UnsupportedFile { file: String, mime_type: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(String),

    #[error("service not configured: {0}")]
    NotReady(String),
}

/// Failure of a session action: either the uploads could not be read or a
/// remote service call failed.
#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}
