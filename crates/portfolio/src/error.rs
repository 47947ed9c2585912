use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortfolioError {
    /// Allocation method label not recognized.
    #[error("unknown allocation method: {0}")]
    UnknownMethod(String),
}
