
mod config;
mod interfaces;
mod player;
mod search;

use std::fs::OpenOptions;
use std::io::Read;

use clap::Parser;

use interfaces::*;

use utils::*;

///
/// A structure representing command line arguments.
///
#[derive(Parser)]
struct CLIArgs
{
    #[clap(short, long, default_value = "play")]
    mode: String,

    #[clap(short, long, default_value = "config/config.toml")]
    config: String
}

fn main () -> Result<()>
{
    let args = CLIArgs::parse();

    let mut config_str = String::new();
    OpenOptions::new().read(true).open(& args.config)?.read_to_string(& mut config_str)?;
    let config : config::Config = toml::from_str(& config_str)?;

    let _logger = log::initialize(& config.log_path, & config.log_spec)?;

    match args.mode.as_str()
    {
        "play" =>
        {
            let mut console = Console::new(& config)?;
            console.run_loop();
        },
        "benchmark" =>
        {
            benchmark::run(& config)?;
        },
        "duel" =>
        {
            duel::run(& config)?;
        },
        _ =>
        {
            return Err(error::error!("Mode '{}' is unsupported.", & args.mode));
        }
    };

    Ok(())
}
