use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("empty url")]
    EmptyUrl,
    #[error("failed to launch {program}: {message}")]
    Spawn { program: String, message: String },
}

/// Desktop capability for handing a URL to its registered handler.
pub trait UrlOpener {
    fn open(&self, url: &str) -> Result<(), LaunchError>;
}

/// Spawns the platform opener without waiting for it to exit.
#[derive(Debug, Clone)]
pub struct SystemOpener {
    program: String,
}

impl SystemOpener {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemOpener {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(not(target_os = "macos"))]
        let program = "xdg-open";
        Self::new(program)
    }
}

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), LaunchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(LaunchError::EmptyUrl);
        }
        let mut child = Command::new(&self.program)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| LaunchError::Spawn {
                program: self.program.clone(),
                message: err.to_string(),
            })?;
        // The caller never waits on the opener; it is reaped off-thread.
        let program = self.program.clone();
        thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                tracing::debug!(%program, %status, "url handler exited with failure");
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(%program, error = %err, "could not reap url handler"),
        });
        Ok(())
    }
}

/// Note-app link that opens `note_id` directly, e.g. `joplin://x-callback-url/openNote?id=n1`.
pub fn note_deep_link(scheme: &str, note_id: &str) -> String {
    let id: String = url::form_urlencoded::byte_serialize(note_id.as_bytes()).collect();
    format!("{scheme}://x-callback-url/openNote?id={id}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::{LaunchError, UrlOpener};

    /// Records opened URLs; optionally fails every launch.
    #[derive(Default)]
    pub struct RecordingOpener {
        pub fail: bool,
        opened: RefCell<Vec<String>>,
    }

    impl RecordingOpener {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn opened(&self) -> Vec<String> {
            self.opened.borrow().clone()
        }
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) -> Result<(), LaunchError> {
            self.opened.borrow_mut().push(url.to_owned());
            if self.fail {
                return Err(LaunchError::Spawn {
                    program: "xdg-open".into(),
                    message: "No such file or directory".into(),
                });
            }
            Ok(())
        }
    }
}
