use clap::Parser;
use mcp_agent::{Cli, run};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err.user_message());
            1
        }
    };
    // Exit explicitly: a pending blocking stdin read would otherwise keep
    // the runtime from shutting down.
    process::exit(code);
}
