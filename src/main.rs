use clap::Parser;
use harp_processor::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match commands::run(args) {
        Ok(_summary) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Harp Processor - salinity and light harp log reader");
    println!("===================================================");
    println!();
    println!("Read sea-ice harp logs into regular (time, module, wire_pair) datasets");
    println!("and derive brine salinity, liquid/solid fraction and bulk salinity.");
    println!();
    println!("USAGE:");
    println!("    harp-processor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    read        Read harp logs and print dataset summaries");
    println!("    evaluate    Detect reference resistance and derive salinity");
    println!("    discover    List harp log files below a directory");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Read a log and export it to Parquet:");
    println!("    harp-processor read harp_2019.dat --output harp_2019.parquet");
    println!();
    println!("    # Evaluate module 0 with the Assur brine salinity formula:");
    println!("    harp-processor evaluate harp_2019.dat --module 0 --formula Assur --show-reference");
    println!();
    println!("For detailed help on any command, use:");
    println!("    harp-processor <COMMAND> --help");
}
