//! libsentinel – recursive directory watching for the sentinel tools.
//!
//! [`watch`] mirrors a directory tree with one native, non-recursive watch
//! per directory, keeps that mirror current as directories come and go,
//! and delivers debounced batches of [`SemanticEvent`]s to a callback.
//!
//! ```no_run
//! let mut watcher = libsentinel::watch(
//!     "/srv/data",
//!     |batch| {
//!         for event in batch {
//!             println!("{event}");
//!         }
//!     },
//!     None,
//! )?;
//! watcher.start()?;
//! # Ok::<(), libsentinel::Error>(())
//! ```

pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod exclude;
pub mod logging;
pub mod normalize;
pub mod source;
pub mod table;
pub mod tree;
pub mod utils;
pub mod watcher;

#[cfg(test)]
mod logging_tests;
#[cfg(test)]
mod test_utils;

pub use config::WatcherConfig;
pub use error::{Error, Result};
pub use event::{Action, SemanticEvent};
pub use source::{NotificationSource, SignalSink, SourceFactory};
pub use watcher::{Watcher, WatcherState, WatcherStatus};

use std::path::Path;

/// Build a watcher for `path`. Call [`Watcher::start`] to begin watching.
///
/// The path is resolved up front; a root that does not exist is only
/// reported by `start()`. Invalid exclusion patterns and a zero queue size
/// fail here with [`Error::Config`].
pub fn watch<P, F>(path: P, callback: F, config: Option<WatcherConfig>) -> Result<Watcher>
where
    P: AsRef<Path>,
    F: FnMut(Vec<SemanticEvent>) + Send + 'static,
{
    let root = utils::resolve_root(path.as_ref());
    Watcher::new(root, config.unwrap_or_default(), callback)
}
