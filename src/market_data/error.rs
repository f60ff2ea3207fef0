use thiserror::Error;

/// Why a single wire frame was discarded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame is missing `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("websocket stream error: {0}")]
    Stream(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("stream closed by server")]
    ClosedByServer,

    #[error("giving up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}
