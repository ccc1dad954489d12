mod cli;

use clap::Parser;

use cli::{Cli, Commands, NotesCommands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = cli::resolve_settings(&cli.paths);

    let result = match cli.command {
        Commands::Init => cli::init::run(&settings),
        Commands::Load { no_filter, json } => cli::load::run(&settings, no_filter, json),
        Commands::Unmapped { no_filter } => cli::unmapped::run(&settings, no_filter),
        Commands::Schemas => cli::schemas::run(&settings),
        Commands::Notes { command } => match command {
            NotesCommands::Get { id } => cli::notes::get(&settings, &id),
            NotesCommands::Set { id, note } => cli::notes::set(&settings, &id, &note),
            NotesCommands::Search { term } => cli::notes::search(&settings, &term),
            NotesCommands::Stats => cli::notes::stats(&settings),
            NotesCommands::Backup { output } => cli::notes::backup(&settings, output),
            NotesCommands::Clear { yes } => cli::notes::clear(&settings, yes),
        },
        Commands::Status => cli::status::run(&settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
