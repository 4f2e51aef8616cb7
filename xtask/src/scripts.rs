use crate::cli;
use bunt::println;
use duct::cmd;
use std::error::Error;

pub fn build(args: &cli::BuildArgs) -> Result<(), Box<dyn Error>> {
    let mut arguments = vec!["build", "--verbose"];

    if let Some(bin) = &args.bin {
        println!("{$magenta}Building {[yellow]}{/$}", bin);
        arguments.push("--bin");
        arguments.push(bin);
    }

    if args.release {
        println!("{$magenta}Building in release mode{/$}");
        arguments.push("--release");
    }

    println!("{$magenta}Building...{/$}");
    cmd("cargo", arguments).run()?;

    Ok(())
}

pub fn install(args: &cli::InstallArgs) -> Result<(), Box<dyn Error>> {
    build(&cli::BuildArgs {
        release: true,
        bin: Some(args.name.clone()),
    })?;

    let target_path = "target/release/".to_string() + &args.name;

    println!("{$magenta}Installing {[yellow]} at {[yellow]}{/$}", &args.name, &args.path);
    cmd!("cp", &target_path, &args.path).run()?;
    cmd!("chmod", "+x", &args.path).run()?;

    Ok(())
}

pub fn test(args: &cli::TestArgs) -> Result<(), Box<dyn Error>> {
    let mut arguments = vec!["test"];

    match &args.package {
        Some(package) => {
            println!("{$magenta}Testing {[yellow]}{/$}", package);
            arguments.push("--package");
            arguments.push(package);
        }
        None => {
            println!("{$magenta}Testing the workspace{/$}");
            arguments.push("--workspace");
        }
    }

    if let Some(filter) = &args.filter {
        arguments.push(filter);
    }

    cmd("cargo", arguments).run()?;

    Ok(())
}

pub fn lint() -> Result<(), Box<dyn Error>> {
    println!("{$magenta}Checking format{/$}");
    cmd!("cargo", "fmt", "--all", "--", "--check").run()?;

    println!("{$magenta}Running clippy{/$}");
    cmd!(
        "cargo",
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings"
    )
    .run()?;

    Ok(())
}
