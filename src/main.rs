use colored::Colorize;
use std::process;

fn main() {
    if let Err(e) = kiln::cli::run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
