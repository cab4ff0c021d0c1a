use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Instant,
};

use clap::Args;
use eyre::Context;
use tandem_pipe::{Relay, copy_sequential};

use super::Command;

/// Subcommand for copying a file with overlapping reads and writes.
#[derive(Debug, Args)]
pub struct FileCopy {
    /// The path to the file to copy from.
    source: PathBuf,

    /// The path to the file to copy to.
    ///
    /// The file is created when missing and truncated otherwise. Its
    /// parent directory must already exist.
    sink: PathBuf,

    /// Copies on the current thread instead of running separate
    /// reader and writer stages.
    #[clap(long)]
    sequential: bool,
}

fn open_source(path: &Path) -> eyre::Result<File> {
    let file = File::open(path)
        .with_context(|| format!("source '{}' is not readable", path.display()))?;

    let metadata = file
        .metadata()
        .with_context(|| format!("failed to query metadata of '{}'", path.display()))?;
    if !metadata.is_file() {
        eyre::bail!("source '{}' is not a regular file", path.display());
    }

    Ok(file)
}

fn check_sink(path: &Path) -> eyre::Result<()> {
    // A bare file name has an empty parent, which means the working
    // directory and is always fine.
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            eyre::bail!(
                "parent directory of sink '{}' does not exist",
                path.display()
            )
        }
        _ => Ok(()),
    }
}

impl Command for FileCopy {
    fn handle(self) -> eyre::Result<()> {
        let source = open_source(&self.source)?;
        check_sink(&self.sink)?;

        let sink = File::create(&self.sink)
            .with_context(|| format!("failed to create sink '{}'", self.sink.display()))?;

        let start = Instant::now();
        let bytes = if self.sequential {
            copy_sequential(source, sink).context("sequential copy failed")?
        } else {
            Relay::new().run(source, sink)?.written
        };

        log::info!(
            "Copied {bytes} bytes from '{}' to '{}' in {}ms",
            self.source.display(),
            self.sink.display(),
            start.elapsed().as_millis()
        );

        // Only reached once both stages have joined.
        println!("done.");
        Ok(())
    }
}
