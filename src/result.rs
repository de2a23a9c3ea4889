//! Result type for the command layer.
//!
//! Library modules return [`crate::error::Result`] with a typed
//! [`crate::error::DarkscopeError`]. Commands and the binary use this
//! `color-eyre` alias instead so failures can pick up context on the way
//! out:
//!
//! ```rust,ignore
//! use color_eyre::eyre::WrapErr;
//! use crate::result::Result;
//!
//! fn load(path: &Path) -> Result<SnapshotPage> {
//!     let page = SnapshotPage::load(path)
//!         .wrap_err_with(|| format!("failed to load {}", path.display()))?;
//!     Ok(page)
//! }
//! ```

use color_eyre::eyre::Result as EyreResult;

/// Standard result type for commands, an alias for
/// `color_eyre::eyre::Result<T>`.
pub type Result<T> = EyreResult<T>;
