//! Qualities command - list downloadable qualities of a manifest.

use std::io::{self, Write};

use console::style;
use dualfetch::discovery::{ManifestProvider, QualityEntry};
use dualfetch::download::HttpClient;
use dualfetch::pipeline::Pipeline;

use super::GlobalArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the qualities command.
pub fn run(global: &GlobalArgs, manifest: &str) -> Result<(), CliError> {
    let runner = CliRunner::new(global.config.as_deref(), global.verbose)?;
    runner.log_startup("qualities");

    let config = runner.download_config();
    let client = HttpClient::new(&config)?;
    let pipeline = Pipeline::new(ManifestProvider::new(client), config);
    let qualities = pipeline.qualities(manifest)?;

    let stdout = io::stdout();
    print_table(&mut stdout.lock(), &qualities).map_err(|e| CliError::Output(e.to_string()))
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes == 0 {
        "unknown".to_string()
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB)
    }
}

fn print_table(out: &mut impl Write, qualities: &[QualityEntry]) -> io::Result<()> {
    if let Some(first) = qualities.first() {
        writeln!(out, "{}", style(&first.title).bold())?;
    }
    if qualities.is_empty() {
        writeln!(out, "No compatible qualities found")?;
        return Ok(());
    }
    for q in qualities {
        writeln!(
            out,
            "  {:<8} {:>12}  {:<14} {:>3} fps",
            style(&q.quality).cyan(),
            format_size(q.size),
            q.codec,
            q.fps
        )?;
    }
    Ok(())
}
