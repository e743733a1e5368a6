//! Viewer collaborator — hands a saved image to the platform's default viewer.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Opens a saved file for display. The result is informational only.
pub trait Viewer: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<()>;
}

/// Launches the platform opener and does not wait for it to exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemViewer;

impl Viewer for SystemViewer {
    fn open(&self, path: &Path) -> io::Result<()> {
        let mut cmd = opener_command(path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = cmd.spawn()?;
        tracing::debug!(pid = child.id(), path = %path.display(), "viewer launched");
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(target_os = "windows")]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", ""]).arg(path);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}

/// Does nothing. Used with `--no-open`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoViewer;

impl Viewer for NoViewer {
    fn open(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}
