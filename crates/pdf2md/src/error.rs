#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
pub enum Error {
    #[error("Unsupported source file: {0}")]
    UnsupportedSource(String),

    #[error("Invalid margin: {0}")]
    InvalidMargin(String),

    #[error("Page {0} does not exist")]
    PageOutOfRange(usize),

    #[error("Prompt template not found: {0}")]
    PromptNotFound(String),
}
