use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::info;

pub const TEST_LOG_NAME: &str = "ir_test.log";

pub const TEST_LOG_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// What happened to the local test log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestLogOutcome {
    Copied { age: Duration },
    NotFound,
    ModifiedInFuture,
    TooOld { age: Duration },
}

/// Copy `source` unmodified into `dest_dir` if it was modified within
/// [`TEST_LOG_MAX_AGE`] of `now` and not after `now`.
pub fn copy_recent_test_log(
    source: &Path,
    dest_dir: &Path,
    now: SystemTime,
) -> Result<TestLogOutcome> {
    let modified = match fs::metadata(source) {
        Ok(meta) => meta
            .modified()
            .with_context(|| format!("read modification time of {}", source.display()))?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no {} was found", source.display());
            return Ok(TestLogOutcome::NotFound);
        }
        Err(e) => return Err(e).with_context(|| format!("stat {}", source.display())),
    };

    let Ok(age) = now.duration_since(modified) else {
        info!("{} was modified in the future, skipping...", source.display());
        return Ok(TestLogOutcome::ModifiedInFuture);
    };

    info!("{} age: {} sec", source.display(), age.as_secs());
    if age > TEST_LOG_MAX_AGE {
        info!("NOT copying {}, because it is too old", source.display());
        return Ok(TestLogOutcome::TooOld { age });
    }

    let file_name = source.file_name().unwrap_or(source.as_os_str());
    let target = dest_dir.join(file_name);
    info!("copying {} to {}", source.display(), target.display());
    fs::copy(source, &target)
        .with_context(|| format!("copy {} to {}", source.display(), target.display()))?;

    Ok(TestLogOutcome::Copied { age })
}
