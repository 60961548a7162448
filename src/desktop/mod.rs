//! Desktop window access
//!
//! Window enumeration for the switch list and coercive focus transfer.
//! Win32 backends are compiled on Windows only; everything else runs
//! against the traits so it can be exercised anywhere.

pub mod directory;
pub mod focus;

pub use directory::{WindowDirectory, WindowHandle, WindowId, WindowSource};
pub use focus::{FocusArbitrator, ForegroundApi};

#[cfg(windows)]
pub use directory::Win32Windows;
#[cfg(windows)]
pub use focus::Win32Foreground;
