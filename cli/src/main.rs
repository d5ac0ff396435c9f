mod commands;
mod terminal;

use bedrock_common::config::EngineConfig;
use commands::{CommandLine, Commands, discover, hardware, install, verify};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init();

    let cfg = EngineConfig::default();

    match commands.command {
        Commands::Discover { cidr } => {
            print::header("network discovery");
            discover::discover(&cidr, &cfg).await
        }
        Commands::Verify {
            address,
            user,
            password,
        } => {
            print::header("connectivity verification");
            verify::verify(address, &user, password.as_deref(), &cfg).await
        }
        Commands::Hardware { address, user } => {
            print::header("hardware introspection");
            hardware::hardware(address, &user, &cfg).await
        }
        Commands::Install {
            plan,
            workdir,
            become_password,
        } => {
            print::header("cluster installation");
            install::install(&plan, &workdir, become_password.as_deref(), &cfg).await
        }
    }
}
