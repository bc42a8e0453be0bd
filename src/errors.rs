/*!
 * Error types for the doctrans application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors that can occur while opening and segmenting documents
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file extension does not map to a supported format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Error opening or reading the input file
    #[error("Could not open document: {0}")]
    Open(String),

    /// Malformed container or XML content
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// The document yielded zero translatable segments
    #[error("No text content found in document")]
    NoContent,

    /// Error writing the reconstructed output container
    #[error("Failed to reconstruct document: {0}")]
    Reconstruction(String),
}

/// Errors that can occur during external PDF conversion
#[derive(Error, Debug)]
pub enum ConversionError {
    /// No converter executable could be located
    #[error("LibreOffice not found. Install LibreOffice to convert PDF files (https://www.libreoffice.org/download/)")]
    ConverterNotFound,

    /// The converter ran but did not produce a usable output
    #[error("PDF conversion failed: {0}")]
    Failed(String),

    /// The converter exceeded its run timeout
    #[error("PDF conversion timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors that can occur when working with refinement provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Non-success HTTP status from the API
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// An explicit error object inside an otherwise-successful response body.
    /// Terminates the remaining refinement queue instead of being retried.
    #[error("Backend reported error: {0}")]
    Backend(String),
}

/// Errors reported by the translation engine, fatal to the run
#[derive(Error, Debug)]
#[error("Translation failed: {0}")]
pub struct TranslationError(pub String);

/// Errors during the refinement pass, scoped to one segment and non-fatal
#[derive(Error, Debug)]
pub enum RefinementError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The configured provider could not be constructed
    #[error("Refinement not configured: {0}")]
    NotConfigured(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from document handling
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from external conversion
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Error from the translation engine
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from a refinement provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The run was cancelled before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Document(DocumentError::Open(error.to_string()))
    }
}

impl From<std::io::Error> for DocumentError {
    fn from(error: std::io::Error) -> Self {
        Self::Open(error.to_string())
    }
}
