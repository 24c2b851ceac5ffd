//! Optional process-wide database cache.
//!
//! Nothing is installed implicitly: a binary that wants one shared cache
//! calls [`install_global_cache`] once at startup, and library code
//! receives a [`DatabaseCache`] reference otherwise.

use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::cache::{DatabaseCache, LoadedDatabase};
use crate::config::CacheConfig;
use crate::error::{Error, Result};

/// Global database cache
static GLOBAL_CACHE: OnceCell<DatabaseCache> = OnceCell::new();

/// Install the process-wide cache.
///
/// Fails if a cache is already installed; the existing one is kept.
pub fn install_global_cache(config: CacheConfig) -> Result<&'static DatabaseCache> {
    config.validate()?;
    let mut installed = false;
    let cache = GLOBAL_CACHE.get_or_init(|| {
        installed = true;
        DatabaseCache::new(config)
    });
    if !installed {
        return Err(Error::Config(
            "global database cache already installed".to_string(),
        ));
    }
    log::debug!("Installed global database cache for {:?}", cache.paths().source);
    Ok(cache)
}

/// The process-wide cache, if installed.
pub fn global_cache() -> Result<&'static DatabaseCache> {
    GLOBAL_CACHE.get().ok_or(Error::NotInitialized)
}

/// Check if the process-wide cache is installed.
pub fn is_installed() -> bool {
    GLOBAL_CACHE.get().is_some()
}

/// Get the database from the process-wide cache, loading it on first use.
pub fn load_global() -> Result<Arc<LoadedDatabase>> {
    global_cache()?.get()
}
