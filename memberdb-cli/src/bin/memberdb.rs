// Command line front end of the commitment registry.
// Every command prints its result as JSON on stdout; logs go to stderr.
// - register / lookup
// - root / history / rebuild
// - prove / verify (verify needs no database)
// - record-verification / status
use clap::Parser;
use memberdb_cli::{cli, commands};

fn main() -> anyhow::Result<()> {
    let args = cli::RegistryCli::parse();
    commands::init_logging(&args.log_level);
    let out = commands::run(&args)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
