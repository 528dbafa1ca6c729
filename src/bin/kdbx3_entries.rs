//! Lists the entries of a kdbx database
//!
//! Protected fields are shown encrypted unless --reveal is given.

use clap::Parser;
use kdbx3_rs::pipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kdbx3-entries", version, about = "List the entries of a KDBX 3 database")]
struct Args {
    /// Path to the kdbx file
    database: PathBuf,
    /// Master password
    #[arg(long, short = 'p', env = "KDBX_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,
    /// Path to a key file
    #[arg(long, short = 'k')]
    key_file: Option<PathBuf>,
    /// Decrypt and print protected fields
    #[arg(long)]
    reveal: bool,
    /// Check the payload block hash
    #[arg(long)]
    verify_blocks: bool,
}

#[tokio::main]
async fn main() -> Result<(), kdbx3_rs::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let key_file = match &args.key_file {
        Some(path) => Some(tokio::fs::read(path).await?),
        None => None,
    };
    let options = kdbx3_rs::UnlockOptions::default().verify_block_hash(args.verify_blocks);
    let source = kdbx3_rs::FileSource::new(&args.database);
    let decoded =
        pipeline::decode_async_with(&source, &args.password, key_file.as_deref(), &options).await?;

    for entry in &decoded.entries {
        println!("[{}]", entry.group_name().unwrap_or(""));
        for (key, value) in entry.fields() {
            println!("  {}: {}", key, value);
        }
        for (key, value) in entry.protected_fields() {
            if args.reveal {
                match decoded.decrypt_field(value) {
                    Ok(text) => println!("  {}: {}", key, text),
                    Err(e) => println!("  {}: <{}>", key, e),
                }
            } else {
                println!("  {}: <protected, {} bytes at {}>", key, value.data().len(), value.position());
            }
        }
    }
    Ok(())
}
