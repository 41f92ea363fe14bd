use crate::commands::TargetArgs;
use crate::error::Error;
use crate::writer::Writer;
use stackgraph_core::{build_graph_with, ResourceGraph, StackConfig};
use std::error::Error as StdError;

pub(crate) trait Runner {
    /// Run the command
    ///
    /// Returns an error shown to the user in case of failure
    fn run(&mut self) -> Result<(), Error>;

    /// Build the resource graph for the project and target given on the command line
    ///
    /// Explicit flags and env vars take precedence over stack.toml.
    fn graph(&self, args: &TargetArgs) -> Result<ResourceGraph, Error> {
        let config = StackConfig::from_path(&args.path)?;
        let target = config.target(args.account.as_deref(), args.region.as_deref());
        log::info!("Building resource graph for {target} from {:?}", args.path);
        Ok(build_graph_with(&target, &config)?)
    }

    /// Construct an error shown to the user
    fn error(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        origin: Option<Box<dyn StdError>>,
    ) -> Error {
        if let Some(origin) = origin {
            log::error!("{origin:?}");
        }

        if let Some(title) = title {
            Error::new(title, description)
        } else {
            Error::new("Failed to run the command", None)
        }
    }
}

/// Return a runner for a command
pub(crate) trait Runnable {
    fn runner<'a>(&self, writer: &'a Writer) -> impl Runner + 'a;
}
