use thiserror::Error;

/// Errors surfaced by initialisation, persistence and asset loading.
///
/// Per-sample numerical anomalies (NaN propagation, zero MIS denominators)
/// are never represented here -- they are masked to zero inline, as required
/// by the error handling design: recoverable only at init/load time.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("cache header mismatch: expected \"{expected}\", found \"{found}\"")]
    CacheHeaderMismatch { expected: String, found: String },

    #[error("cache build parameters diverge from the requested ones")]
    CacheParamsMismatch,

    #[error("cache file truncated while reading {context}")]
    CacheTruncated { context: &'static str },

    #[error("cache file has {extra} trailing byte(s) after the expected payload")]
    CacheTrailingBytes { extra: usize },

    #[error("cache recomputed {what} count ({recomputed}) differs from the header ({header})")]
    CacheCountMismatch {
        what: &'static str,
        header: u32,
        recomputed: u32,
    },

    #[error("triangulation build failed: {reason}")]
    BuildFailed { reason: &'static str },

    #[error("unknown scene id {0}")]
    InvalidScene(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
