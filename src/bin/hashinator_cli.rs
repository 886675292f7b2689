use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hashinator::{
    configuration::{file::Config, Configuration},
    hashinator::Hashinator,
    telemetry::{initialize_subscriber, LogFormat},
    value::{Value, ValueType},
};

#[derive(Debug, Parser)]
#[command(name = "hashinator-cli")]
#[command(about = "maps partitioning keys to partitions", long_about = None)]
struct Cli {
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Prints the partition of a typed value under the given configuration file
    #[command()]
    Hash {
        #[arg(long)]
        config_path: PathBuf,
        /// eg: tiny_int, small_int, integer, big_int, string, var_binary
        #[arg(long)]
        value_type: ValueType,
        /// the literal to hash. `null` yields the NULL of `value_type`, var_binary literals are hex encoded
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },
    /// Prints the hex encoded configuration bytes described by the given configuration file
    #[command()]
    Encode {
        #[arg(long)]
        config_path: PathBuf,
    },
    /// Describes hex encoded configuration bytes
    #[command()]
    Decode {
        #[arg(long)]
        hex: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    initialize_subscriber(args.log_format);

    match args.command {
        Commands::Hash {
            config_path,
            value_type,
            value,
        } => {
            let configuration = Config::from_path(config_path)?.to_configuration()?;
            let hashinator = Hashinator::with_configuration(
                configuration.scheme_type(),
                &configuration.encode(),
            )?;
            let value = Value::parse_literal(value_type, &value)?;
            println!("{}", hashinator.hash_to_partition(&value)?);
        }
        Commands::Encode { config_path } => {
            let configuration = Config::from_path(config_path)?.to_configuration()?;
            println!("{}", hex::encode(configuration.encode()));
        }
        Commands::Decode { hex } => {
            let bytes = hex::decode(hex.trim())?;
            println!("{}", Configuration::decode(&bytes)?);
        }
    }

    Ok(())
}
