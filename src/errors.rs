use crate::metadata::ParserKind;

/// Failure of a single metadata provider. Both variants advance the fallback chain.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("unexpected response shape: {0}")]
    Normalize(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Fetch(err.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MaterializeError {
    #[error("image download failed: {0}")]
    Fetch(String),

    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("could not move image into place: {0}")]
    Persist(String),
}

impl From<reqwest::Error> for MaterializeError {
    fn from(err: reqwest::Error) -> Self {
        MaterializeError::Fetch(err.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EmbedError {
    #[error("need a link to convert to embed")]
    NeedLink,

    #[error("unknown parser type: {0}")]
    UnknownParser(String),

    #[error("failed to fetch data, tried {}", describe_failures(.failures))]
    AllParsersExhausted {
        failures: Vec<(ParserKind, ProviderError)>,
    },

    #[error("materialize error: {0}")]
    Materialize(#[from] MaterializeError),

    #[error("placeholder has been deleted or modified, replacing is cancelled")]
    ConcurrencyAbort,
}

fn describe_failures(failures: &[(ParserKind, ProviderError)]) -> String {
    failures
        .iter()
        .map(|(kind, err)| format!("{kind} ({err})"))
        .collect::<Vec<_>>()
        .join(", ")
}
