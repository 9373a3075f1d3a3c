/// Recommended error type for your benchmark `main` function. Library errors from the remote
/// session and the parser convert into it, so you can use `?` to propagate them.
pub type BenchResult<T> = anyhow::Result<T>;
