mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;

use clap::Parser;
use std::error;
use std::path::Path;
use tokio::io::AsyncReadExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    let client = ClientCli::connect(&args.server)?;

    match args.sub_command {
        SubCommand::Execute { script } => {
            let script = read_script(&script).await?;
            client.execute(&script).await?;
        }
        SubCommand::Health => {
            client.health().await?;
        }
    }

    Ok(())
}

async fn read_script(path: &Path) -> client_cli::Result<String> {
    if path == Path::new("-") {
        let mut script = String::new();
        tokio::io::stdin().read_to_string(&mut script).await?;
        return Ok(script);
    }
    Ok(tokio::fs::read_to_string(path).await?)
}
