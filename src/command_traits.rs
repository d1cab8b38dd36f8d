//! Type-safe external command contracts.
//!
//! Every external invocation in the pipeline (`aws`, `flutter`) is described
//! by a struct implementing `CommandArgs` instead of a concatenated shell
//! string. The struct definition IS the contract: the runner never goes
//! through a shell, so bucket names and paths are passed verbatim as single
//! argv entries and cannot be re-split or interpreted.

/// Trait for typed external command arguments.
///
/// # Contract
///
/// - `program()`: executable name resolved on `PATH` (e.g. `"aws"`).
/// - `to_cli_args()`: argv after the program name, exactly as the tool
///   expects it.
/// - `get_env_vars()`: extra environment variables for this invocation only.
/// - `step_name()`: human-readable step label used in logs and errors.
///
/// # Example
///
/// ```
/// use s3deploy::command_traits::CommandArgs;
/// use s3deploy::commands::aws::WebsiteArgs;
///
/// let args = WebsiteArgs {
///     bucket: "my-site".to_string(),
///     index_document: "index.html".to_string(),
///     error_document: "index.html".to_string(),
/// };
///
/// assert_eq!(args.program(), "aws");
/// assert_eq!(
///     args.to_cli_args(),
///     vec![
///         "s3", "website", "s3://my-site/",
///         "--index-document", "index.html",
///         "--error-document", "index.html",
///     ]
/// );
/// ```
pub trait CommandArgs {
    /// Executable to run.
    fn program(&self) -> &'static str;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Environment variables set for this invocation.
    ///
    /// Defaults to none.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Step label, e.g. "Creating S3 bucket".
    fn step_name(&self) -> &'static str;

    /// Space-joined command line for display only. Never executed.
    fn display_command(&self) -> String {
        let mut parts = vec![self.program().to_string()];
        parts.extend(self.to_cli_args());
        parts.join(" ")
    }
}
