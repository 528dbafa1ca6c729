//! Prints the decrypted XML of a kdbx database
//!
//! Primarily for investigating the kdbx format. The password may be given
//! on the CLI, which is insecure, prefer the KDBX_PASSWORD variable.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kdbx3-decrypt", version, about = "Print the decrypted XML of a KDBX 3 database")]
struct Args {
    /// Path to the kdbx file
    database: PathBuf,
    /// Master password
    #[arg(long, short = 'p', env = "KDBX_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,
    /// Path to a key file
    #[arg(long, short = 'k')]
    key_file: Option<PathBuf>,
    /// Check the payload block hash
    #[arg(long)]
    verify_blocks: bool,
}

fn main() -> Result<(), kdbx3_rs::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let bytes = std::fs::read(&args.database)?;
    let key_file = args.key_file.as_ref().map(std::fs::read).transpose()?;
    let options = kdbx3_rs::UnlockOptions::default().verify_block_hash(args.verify_blocks);
    let decoded = kdbx3_rs::decode_with(&bytes, &args.password, key_file.as_deref(), &options)?;
    println!("{}", decoded.document);
    Ok(())
}
