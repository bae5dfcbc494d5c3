use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("No documents to merge")]
    NoDocuments,

    #[error("Missing package part: {0}")]
    MissingPart(String),

    #[error("Failed to read DOCX package: {0}")]
    Package(String),

    #[error("Failed to parse document XML: {0}")]
    Xml(String),
}
