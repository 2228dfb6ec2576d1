//! `capaian init` command - create a new store

use std::path::Path;

use capaian_core::error::Result;
use capaian_core::format::OutputFormat;
use capaian_core::store::Store;

use crate::cli::Cli;

pub fn execute(cli: &Cli, root: &Path) -> Result<()> {
    let store = Store::init(root)?;

    match cli.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "status": "ok",
                "store": store.root().display().to_string(),
                "message": "Store initialized"
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            if !cli.quiet {
                println!("Initialized capaian store at {}", store.root().display());
            }
        }
        OutputFormat::Records => {
            println!(
                "H capaian=1 records=1 store={} mode=init status=ok",
                store.root().display()
            );
        }
    }

    Ok(())
}
