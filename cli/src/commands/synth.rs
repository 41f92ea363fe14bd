mod runner;
use crate::commands::TargetArgs;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use clap::ArgAction;
use runner::SynthRunner;
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub(crate) struct SynthCommand {
    #[command(flatten)]
    pub(crate) target: TargetArgs,

    /// Directory to write the template and the asset manifest to
    #[arg(short, long, value_name = "DIR", default_value = "stack.out")]
    pub(crate) output: PathBuf,

    /// Print the template instead of writing files
    #[arg(long, action = ArgAction::SetTrue)]
    pub(crate) stdout: bool,
}

impl Runnable for SynthCommand {
    fn runner<'a>(&self, writer: &'a Writer) -> impl Runner + 'a {
        SynthRunner {
            command: self.clone(),
            writer,
        }
    }
}
