use stackgraph_core::GraphError;

/// Display global error message in unified format
#[derive(Debug)]
pub struct Error(String, Option<String>);

impl Error {
    pub fn new(message: &str, details: Option<&str>) -> Self {
        Error(message.to_string(), details.map(|d| d.to_string()))
    }
}

/// Display the message and details, as sort of a hint
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}\n\n{}",
            self.0,
            console::style(self.1.clone().unwrap_or("".into())).dim()
        )
    }
}

impl std::error::Error for Error {}

/// Automatically convert all eyre error reports
impl From<eyre::ErrReport> for Error {
    fn from(error: eyre::ErrReport) -> Self {
        log::error!("{error:?}");

        error
            .downcast::<Error>()
            .unwrap_or_else(|err| Error::new(&err.to_string(), None))
    }
}

/// Graph construction errors are all fatal, explain what to fix
impl From<GraphError> for Error {
    fn from(error: GraphError) -> Self {
        log::error!("{error:?}");

        match error {
            GraphError::Configuration { message } => Error::new(
                "Invalid configuration",
                Some(&format!(
                    "{message}\nCheck stack.toml and the --region/--account flags."
                )),
            ),

            GraphError::BuildContext { path, reason } => Error::new(
                "Container build context is not usable",
                Some(&format!("{reason}\nPath: {}", path.display())),
            ),

            other => Error::new("Failed to run the command", Some(&other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn graph_errors_get_a_title_and_a_hint() {
        let error = Error::from(GraphError::Configuration {
            message: "Region must not be empty".into(),
        });

        assert!(error.to_string().starts_with("Invalid configuration\n"));
        assert!(error.to_string().contains("Region must not be empty"));

        let error = Error::from(GraphError::BuildContext {
            path: PathBuf::from("TestApp/TestApp"),
            reason: "Path does not exist".into(),
        });

        assert!(error.to_string().starts_with("Container build context is not usable"));
        assert!(error.to_string().contains("TestApp/TestApp"));
    }

    #[test]
    fn eyre_reports_keep_wrapped_errors() {
        let report = eyre::Report::new(Error::new("Custom", Some("details")));
        assert!(Error::from(report).to_string().starts_with("Custom\n"));

        let report = eyre::eyre!("Plain failure");
        assert!(Error::from(report).to_string().starts_with("Plain failure\n"));
    }
}
