use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Compressed archive suffixes found in rotated logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.zst`, decompressed by the external `zstd` tool
    Zstd,
    /// `.gz`, decompressed in-process
    Gzip,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "zst" => Some(ArchiveKind::Zstd),
            "gz" => Some(ArchiveKind::Gzip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecompressStats {
    pub decompressed: usize,
    pub failed: usize,
}

/// Decompress every archive below `root` in place.
///
/// The archive is removed only after its content was written; failures are
/// logged and the archive is kept.
pub fn decompress_tree(root: &Path) -> DecompressStats {
    info!(
        "📦 Decompressing archives in {} ...",
        root.display()
    );

    let archives: Vec<(PathBuf, ArchiveKind)> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| ArchiveKind::from_path(e.path()).map(|kind| (e.into_path(), kind)))
        .collect();

    let mut stats = DecompressStats::default();
    for (archive, kind) in archives {
        match decompress_archive(&archive, kind) {
            Ok(output) => {
                debug!("Decompressed {} -> {}", archive.display(), output.display());
                stats.decompressed += 1;
            }
            Err(e) => {
                warn!("⚠️  Keeping {}: {:#}", archive.display(), e);
                stats.failed += 1;
            }
        }
    }

    info!(
        "✅ {} archive(s) decompressed, {} failed",
        stats.decompressed, stats.failed
    );
    stats
}

/// Decompress one archive next to itself and remove it. Returns the output path.
pub fn decompress_archive(archive: &Path, kind: ArchiveKind) -> Result<PathBuf> {
    let output = archive.with_extension("");
    if output.exists() {
        return Err(anyhow!("{} already exists", output.display()));
    }

    let result = match kind {
        ArchiveKind::Gzip => gunzip(archive, &output),
        ArchiveKind::Zstd => unzstd(archive, &output),
    };
    if let Err(e) = result {
        let _ = fs::remove_file(&output);
        return Err(e);
    }

    if let Ok(modified) = fs::metadata(archive).and_then(|m| m.modified()) {
        File::options()
            .write(true)
            .open(&output)
            .and_then(|f| f.set_times(FileTimes::new().set_modified(modified)))
            .with_context(|| format!("set modification time of {}", output.display()))?;
    }

    fs::remove_file(archive).with_context(|| format!("remove {}", archive.display()))?;
    Ok(output)
}

fn gunzip(archive: &Path, output: &Path) -> Result<()> {
    let mut decoder = GzDecoder::new(File::open(archive)?);
    let mut out = File::create(output)?;
    io::copy(&mut decoder, &mut out).with_context(|| format!("gunzip {}", archive.display()))?;
    Ok(())
}

fn unzstd(archive: &Path, output: &Path) -> Result<()> {
    let status = Command::new("zstd")
        .arg("-d")
        .arg("-q")
        .arg(archive)
        .arg("-o")
        .arg(output)
        .status()
        .context("Failed to execute zstd")?;

    if !status.success() {
        return Err(anyhow!("zstd exited with {}", status));
    }
    Ok(())
}
