//! CLI command implementations

pub mod account;
pub mod export;
pub mod import;
pub mod insert;
pub mod logs;
pub mod price;
pub mod search;
pub mod signal;
pub mod validate;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parsec_core::{EntryPoint, ParsecContext};
use tracing::debug;
use uuid::Uuid;

use crate::output;

/// Get the parsec directory from environment or default
pub fn get_parsec_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PARSEC_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".parsec"))
        .context("Could not find home directory; set PARSEC_DIR")
}

/// Get or create parsec context
pub fn get_context() -> Result<ParsecContext> {
    let parsec_dir = get_parsec_dir()?;

    std::fs::create_dir_all(&parsec_dir)
        .with_context(|| format!("Failed to create parsec directory: {:?}", parsec_dir))?;
    debug!(dir = ?parsec_dir, "opening parsec context");

    ParsecContext::new(&parsec_dir, EntryPoint::Cli).context("Failed to initialize parsec context")
}

/// Resolve `--token` / `PARSEC_TOKEN` to an account id
pub fn authenticate(ctx: &ParsecContext, token: Option<&str>) -> Result<Uuid> {
    let token = token.context("No token provided. Use --token or set PARSEC_TOKEN.")?;
    Ok(ctx.authenticate(token)?)
}

/// Read input from a file, or from stdin when it is piped
pub fn read_input(file: Option<&Path>, what: &str) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} file: {:?}", what, path));
    }
    if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .with_context(|| format!("Failed to read {} from stdin", what))?;
        return Ok(buffer);
    }
    anyhow::bail!("No {} provided. Pass a file path or pipe it on stdin.", what)
}

/// Turn a failed core operation into the command error. In JSON mode the
/// `{ success: false, ... }` body is printed to stdout first.
pub fn fail(e: parsec_core::Error, json: bool) -> anyhow::Error {
    if json {
        output::error_json(&e);
    }
    e.into()
}
