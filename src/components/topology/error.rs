//! Error types for topology ingestion and configuration.

use thiserror::Error;

/// A specialized `Result` type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors surfaced by the topology core.
///
/// Data-quality problems inside an otherwise readable document (dangling
/// links, duplicate ids) are not errors; they are logged and dropped.
#[derive(Error, Debug)]
pub enum TopologyError {
	/// The topology document could not be parsed.
	#[error("Parse error: {0}")]
	Parse(#[from] serde_json::Error),

	/// A layout mode name was not recognised.
	#[error("Unknown layout: {0}")]
	UnknownLayout(String),

	/// The drawing surface has no usable area.
	#[error("Invalid viewport: {width}x{height}")]
	InvalidViewport {
		/// Requested width.
		width: f64,
		/// Requested height.
		height: f64,
	},
}
