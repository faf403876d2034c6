mod commands;
mod terminal;

use commands::{CommandLine, Commands, action, resolve, scan};
use doorlink_core::actions::DoorAction;
use is_root::is_root;
use terminal::{logging, print};
use tracing::warn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init(commands.verbose, commands.quiet);
    print::banner(commands.quiet);

    let cfg = commands.config();
    let q_level: u8 = commands.quiet;

    if cfg.probe.use_icmp && !is_root() {
        warn!("Not running as root: ICMP is skipped and hosts are probed over TCP only");
    }

    let result = match commands.command {
        Commands::Scan { network } => {
            print::header("starting reachability scan", q_level);
            scan::scan(network, &cfg, q_level).await
        }
        Commands::Resolve => {
            print::header("resolving devices", q_level);
            resolve::resolve(&cfg, q_level).await
        }
        Commands::Open => action::perform(DoorAction::OpenDoor, &cfg, q_level).await,
        Commands::Close => action::perform(DoorAction::CloseDoor, &cfg, q_level).await,
        Commands::Feed => action::perform(DoorAction::StartFeed, &cfg, q_level).await,
        Commands::Exec { role, command } => action::exec(&role, &command, &cfg, q_level).await,
    };

    print::end_of_program(q_level);
    result
}
