/// Everything that can go wrong in a reconstruction.
///
/// All validation happens before the first iteration, so apart from
/// `NumericInstability`, an error means that no work was done.
#[derive(thiserror::Error, Debug)]
pub enum ReconError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("non-finite pixel value in slice {slice} after iteration {iteration}")]
    NumericInstability { slice: usize, iteration: usize },

    #[error("could not read config file `{path}`: {source}")]
    ConfigIo { path: std::path::PathBuf, source: std::io::Error },

    #[error("could not parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ReconError>;
