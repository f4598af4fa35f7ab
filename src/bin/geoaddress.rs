//! geoaddress CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;

use geoaddress::cli::args::GeoAddressArgs;
use geoaddress::cli::commands::execute_command;

fn main() {
    let args = GeoAddressArgs::parse();

    let log_level = args.log_level();

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
