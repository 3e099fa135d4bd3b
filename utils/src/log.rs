
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle, with_thread, WriteMode};

use super::error::*;

///
/// The facade macros the whole workspace logs through. Only the binary
/// installs a backend; library crates never touch the logger itself.
///
pub use log::{debug, error, info, trace, warn};

///
/// Starts the process-wide file logger.
///
/// Every run gets its own timestamped file, named after the binary, inside
/// the given directory. Records carry the emitting thread's name, since the
/// interesting interleavings here are between the planner, the gravity and
/// mover timers, and the search workers. Writes are buffered and flushed by
/// a background thread so that logging from those hot timer loops stays
/// cheap; info and above is mirrored to stderr for the operator. The spec
/// string uses the log crate's filter syntax ("info", "engine=debug", ...).
///
/// The returned handle must be kept alive for the duration of the run;
/// dropping it flushes the buffer and shuts the logger down.
///
pub fn initialize (directory: & str, spec: & str) -> Result<LoggerHandle>
{
    let file_spec = FileSpec::default()
        .directory(directory)
        .use_timestamp(true);

    let handle = Logger::try_with_str(spec)?
        .log_to_file(file_spec)
        .format_for_files(with_thread)
        .write_mode(WriteMode::BufferAndFlush)
        .duplicate_to_stderr(Duplicate::Info)
        .start()?;

    info!("Logging started.");

    Ok(handle)
}
