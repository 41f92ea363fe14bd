mod runner;
use crate::commands::TargetArgs;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use runner::ShowRunner;

#[derive(clap::Args, Clone)]
pub(crate) struct ShowCommand {
    #[command(flatten)]
    pub(crate) target: TargetArgs,
}

impl Runnable for ShowCommand {
    fn runner<'a>(&self, writer: &'a Writer) -> impl Runner + 'a {
        ShowRunner {
            command: self.clone(),
            writer,
        }
    }
}
