mod args;
mod config;
mod error;
mod prelude;
mod provider;
mod relay;

use crate::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = build_args()?;

    if args.print_system {
        println!("{}", render_system(&args)?);
        return Ok(());
    }

    relay::serve(args).await
}
