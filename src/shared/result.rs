/// Type alias for Result with anyhow::Error as the error type.
/// Typed failures travel inside as `ReconcileError` and are recovered with `downcast_ref`.
pub type Result<T> = std::result::Result<T, anyhow::Error>;
