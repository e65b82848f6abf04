use colored::Colorize;

use spice::{cli, commands};

fn main() {
    let cli = cli::parse();

    let code = match commands::dispatch(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            1
        }
    };
    std::process::exit(code);
}
