mod cli;

use colored::Colorize;
use tracing_subscriber::filter::LevelFilter;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    let level = if command_line_interface.verbose() { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
