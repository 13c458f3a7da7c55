use std::path::Path;

use anyhow::{Context, Result};

use docimport_lib::document::{StateCodec, YrsStateCodec};

use crate::render::terminal::render_blocks;
use crate::OutputFormat;

pub fn run(state_file: &Path, format: &OutputFormat, use_color: bool) -> Result<()> {
    let state = std::fs::read(state_file)
        .with_context(|| format!("Failed to read {}", state_file.display()))?;
    let tree = YrsStateCodec
        .decode(&state)
        .with_context(|| format!("{} is not a valid document state", state_file.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
        OutputFormat::Plain => println!("{}", render_blocks(&tree.blocks, use_color)),
    }

    Ok(())
}
