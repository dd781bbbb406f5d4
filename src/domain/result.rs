//! Result type alias for the invoicer

use super::errors::InvoicerError;

/// Result type alias for invoicer operations
///
/// # Examples
///
/// ```
/// use invoicer::domain::result::Result;
/// use invoicer::domain::errors::InvoicerError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(InvoicerError::Configuration("missing template".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, InvoicerError>;
