mod cli;

use taskline_core::interrupt;

fn main() {
    if let Err(e) = cli::run() {
        if interrupt::is_interrupted() {
            std::process::exit(130);
        }
        eprintln!("{e:#}"); // pretty anyhow chain
        std::process::exit(1);
    }
}
