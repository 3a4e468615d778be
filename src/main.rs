use clap::Parser;
use std::process;

use taglet::cli::{add_tag, delete_tag, favorite_tag, list_tags, Commands, Taglet};
use taglet::daemon::{daemon_status, start_daemon, stop_daemon};

fn main() {
    env_logger::init();

    let taglet = Taglet::parse();

    match taglet.commands {
        Some(Commands::Add { tag, content, image }) => add_tag(&tag, content, image),
        Some(Commands::Delete { tag, image }) => delete_tag(&tag, image),
        Some(Commands::List { image, newest }) => list_tags(image, newest),
        Some(Commands::Favorite { tag }) => favorite_tag(&tag),
        Some(Commands::Start) => {
            if let Err(e) = start_daemon() {
                eprintln!("Failed to start daemon: {}", e);
                process::exit(1);
            }
        }
        Some(Commands::Stop) => {
            if let Err(e) = stop_daemon() {
                eprintln!("Failed to stop daemon: {}", e);
                process::exit(1);
            }
        }
        Some(Commands::Status) => {
            if let Err(e) = daemon_status() {
                eprintln!("Failed to check daemon status: {}", e);
                process::exit(1);
            }
        }
        None => {
            eprintln!("No command given; try `taglet --help`");
        }
    }
}
