//! Download command - run the full pipeline for one quality.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use dualfetch::discovery::ManifestProvider;
use dualfetch::download::HttpClient;
use dualfetch::pipeline::{DownloadRequest, Pipeline, ProgressSink};

use super::GlobalArgs;
use crate::error::CliError;
use crate::progress::PipelineBar;
use crate::runner::CliRunner;

/// Arguments for the download command.
pub struct DownloadArgs {
    pub manifest: String,
    pub quality: String,
    pub output: PathBuf,
    pub temp_dir: Option<PathBuf>,
}

/// Run the download command.
pub fn run(global: &GlobalArgs, args: DownloadArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global.config.as_deref(), global.verbose)?;
    runner.log_startup("download");

    let config = runner.download_config();
    let client = HttpClient::new(&config)?;
    let pipeline = Pipeline::new(ManifestProvider::new(client), config);

    // Relative outputs land in the configured output directory.
    let output_path = if args.output.is_relative() {
        runner.config().output.output_dir.join(&args.output)
    } else {
        args.output
    };
    let request = DownloadRequest {
        page_url: args.manifest,
        quality: args.quality,
        temp_dir: runner.temp_dir(args.temp_dir),
        output_path,
    };

    let bar = Arc::new(PipelineBar::new());
    let sink: Arc<dyn ProgressSink> = bar.clone();
    match pipeline.download(&request, sink) {
        Ok(summary) => {
            bar.finish();
            println!(
                "{} {} -> {}",
                style("Saved").green().bold(),
                summary.title,
                summary.output_path.display()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e.into())
        }
    }
}
