//! Account Command

use crate::config::DdcConfig;
use crate::symbols;
use anyhow::Result;
use console::style;

/// Print the public halves of the configured keys
pub fn run(cfg: &DdcConfig) -> Result<()> {
    let signer = cfg.signing_key()?;

    println!();
    println!("{}", style("Account").bold().underlined());
    println!();
    println!(
        "  Signer public key: {}",
        hex::encode(signer.verifying_key().as_bytes())
    );
    match cfg.box_keypair()? {
        Some(keys) => println!("  Box public key:    {}", keys.public()),
        None => println!("  Box public key:    {}", style("(no box_seed)").dim()),
    }
    match cfg.master_key()? {
        Some(_) => println!("  {} Master secret configured", symbols::LOCK),
        None => println!(
            "  {} No master secret, encryption unavailable",
            style(symbols::WARN).yellow()
        ),
    }
    match cfg.bucket_id {
        Some(id) => println!("  Default bucket:    {}", id),
        None => println!("  Default bucket:    {}", style("(unset)").dim()),
    }
    println!("  Storage nodes:     {}", cfg.nodes.len());
    println!();

    Ok(())
}
