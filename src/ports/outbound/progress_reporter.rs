/// ProgressReporter port for user-facing feedback during batch ingestion
///
/// Kept apart from `tracing` logs: these messages are meant for the person
/// running the command, not for log collection.
pub trait ProgressReporter {
    /// Reports a progress message
    fn report(&self, message: &str);

    /// Reports how many of `total` reports have been handled so far
    ///
    /// # Arguments
    /// * `current` - Reports handled so far
    /// * `total` - Reports in the batch
    /// * `message` - Optional detail, usually the report being handled
    fn report_progress(&self, current: usize, total: usize, message: Option<&str>);

    /// Reports a failed report without aborting the batch
    fn report_error(&self, message: &str);

    /// Reports completion of the batch
    fn report_completion(&self, message: &str);
}
