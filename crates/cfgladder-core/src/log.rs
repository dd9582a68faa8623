/// Sink for run progress. Implementations decide where lines go; callers never
/// observe write failures.
pub trait Logger {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}
