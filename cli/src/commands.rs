pub mod show;
pub mod synth;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the resource graph of the stack
    Show(show::ShowCommand),

    /// Synthesize the template and the asset manifest for the provisioning engine
    Synth(synth::SynthCommand),
}

/// Where the graph is built from and for which account and region
#[derive(clap::Args, Clone, Debug)]
pub(crate) struct TargetArgs {
    /// Project directory, the one with stack.toml
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub(crate) path: PathBuf,

    /// Region to deploy to (overrides stack.toml)
    #[arg(short, long, env = "STACKGRAPH_REGION")]
    pub(crate) region: Option<String>,

    /// Account to deploy to, resolved by the provisioning engine if omitted
    #[arg(short, long, env = "STACKGRAPH_ACCOUNT")]
    pub(crate) account: Option<String>,
}
