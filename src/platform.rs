//! Host platform detection.
use std::fmt;

use crate::error::CollaboratorError;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux and other Unix-like systems.
    Linux,
    /// Windows.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, Copy)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            os: Self::detect_os(),
        }
    }

    /// Create a platform with an explicit OS.
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }

    /// Whether this is Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Fail unless running on Windows.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Unsupported`] naming `what` on any other OS.
    pub fn require_windows(&self, what: &str) -> Result<(), CollaboratorError> {
        if self.is_windows() {
            Ok(())
        } else {
            Err(CollaboratorError::Unsupported {
                what: what.to_string(),
                platform: self.os.to_string(),
            })
        }
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Linux
        }
    }
}
