use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "xtasks")]
#[command(about = "Run project tasks using rust instead of scripts")]
pub struct App {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Builds one of the project binaries
    Build(BuildArgs),
    /// Builds a binary and installs it at the given path
    Install(InstallArgs),
    /// Runs the workspace test suite
    Test(TestArgs),
    /// Checks formatting and runs clippy on the whole workspace
    Lint,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Release flag
    #[arg(short, long)]
    pub release: bool,

    /// Name of the binary to build.
    #[arg(short, long)]
    pub bin: Option<String>,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Name of the binary to install.
    #[arg(short, long, default_value = "chat-relay")]
    pub name: String,

    /// Path to install the binary to.
    #[arg(short, long)]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Only run the tests of this package.
    #[arg(short, long)]
    pub package: Option<String>,

    /// Only run tests whose name contains this filter.
    pub filter: Option<String>,
}
