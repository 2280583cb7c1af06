use std::{
    io::{self, Read},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use derive_more::{Display, Error, From};
use tracing::debug;

use super::super::types::Turn;

/// Where the game server keeps its save files inside the container.
pub const CONTAINER_SAVE_DIR: &str = "/var/lib/tomcat10/webapps/data/savegames";

const LIST_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// An error that occurred while fetching a save from an external source.
#[derive(Debug, From, Display, Error)]
pub enum FetchError {
    IoError(io::Error),
    /// The command didn't finish in time and was killed
    #[display("{} timed out after {}s", _0, _1.as_secs())]
    Timeout(#[error(not(source))] String, #[error(not(source))] Duration),
    /// The command exited with a non zero status
    #[display("{} failed: {}", _0, _1)]
    CommandFailed(#[error(not(source))] String, #[error(not(source))] String),
}

/// A raw save file, as fetched from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSave {
    pub filename: String,
    pub contents: Vec<u8>,
}

/// Something that can supply save files that are not yet cached locally.
pub trait SaveFileSource {
    /// Fetches the newest save of `username` labelled with `turn`.
    /// Returns `Ok(None)` if the source has no such save.
    fn fetch(&self, username: &str, turn: Turn) -> Result<Option<FetchedSave>, FetchError>;
}

/// The filename prefix the server gives saves of a turn.
pub fn save_prefix(username: &str, turn: Turn) -> String {
    format!("{}_T{}_", username, turn)
}

/// The ordering key of a save named `<prefix><n>...`, higher is newer.
/// Saves without a number after the prefix sort first, ties by name.
pub(super) fn save_order<'a>(name: &'a str, prefix: &str) -> (Option<u64>, &'a str) {
    let number = name.strip_prefix(prefix).and_then(|rest| {
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        rest[..end].parse().ok()
    });
    (number, name)
}

/// Drains a pipe on another thread, so that the child can't block on it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join(handle: thread::JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked")))
}

/// Waits for the child up to `timeout`, killing it if it overruns.
fn wait_with_timeout(mut child: Child, label: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            child.kill()?;
            child.wait()?;
            return Err(FetchError::Timeout(label.to_owned(), timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };
    let stdout = join(stdout)?;
    let stderr = join(stderr)?;
    if !status.success() {
        return Err(FetchError::CommandFailed(
            label.to_owned(),
            String::from_utf8_lossy(&stderr).trim().to_owned(),
        ));
    }
    Ok(stdout)
}

/// Fetches saves out of the game server's docker container.
pub struct ContainerSource {
    container: String,
    save_dir: String,
    list_timeout: Duration,
    read_timeout: Duration,
}

impl ContainerSource {
    pub fn new(container: impl Into<String>) -> Self {
        ContainerSource {
            container: container.into(),
            save_dir: CONTAINER_SAVE_DIR.to_owned(),
            list_timeout: LIST_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Runs `docker exec <container> <args>` and returns its stdout.
    fn exec(&self, args: &[&str], timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let label = format!("docker exec {} {}", self.container, args.join(" "));
        debug!("running {}", label);
        let child = Command::new("docker")
            .arg("exec")
            .arg(&self.container)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        wait_with_timeout(child, &label, timeout)
    }
}

/// Picks the newest file with the given prefix out of a directory listing.
fn newest_match<'a>(listing: &'a str, prefix: &str) -> Option<&'a str> {
    listing
        .lines()
        .map(str::trim)
        .filter(|name| name.starts_with(prefix))
        .max_by_key(|name| save_order(*name, prefix))
}

impl SaveFileSource for ContainerSource {
    fn fetch(&self, username: &str, turn: Turn) -> Result<Option<FetchedSave>, FetchError> {
        let dir = format!("{}/{}", self.save_dir, username);
        let listing = match self.exec(&["ls", &dir], self.list_timeout) {
            Ok(listing) => listing,
            // ls fails on a missing directory, that just means no saves
            Err(FetchError::CommandFailed(label, err)) => {
                debug!("{} failed: {}", label, err);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let listing = String::from_utf8_lossy(&listing);
        let Some(filename) = newest_match(&listing, &save_prefix(username, turn)) else {
            return Ok(None);
        };
        let path = format!("{}/{}", dir, filename);
        let contents = self.exec(&["cat", &path], self.read_timeout)?;
        Ok(Some(FetchedSave {
            filename: filename.to_owned(),
            contents,
        }))
    }
}
