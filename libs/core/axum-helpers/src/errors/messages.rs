//! Standard messages for error bodies that must not leak internals.

pub const VALIDATION_FAILED: &str = "Validation failed for the provided input.";
pub const INVALID_UUID: &str = "Invalid UUID format.";
pub const NOT_FOUND_RESOURCE: &str = "Requested resource was not found.";
pub const METHOD_NOT_ALLOWED: &str = "The HTTP method is not allowed for this resource.";
pub const UNAUTHORIZED: &str = "Unauthorized";
pub const FORBIDDEN: &str = "Access forbidden";
pub const UPSTREAM_ERROR: &str = "A dependent service failed to process the request.";
pub const INTERNAL_ERROR: &str = "An unexpected error occurred.";
