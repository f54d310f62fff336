//! Process-wide defaults.
//!
//! The default segment size is resolved exactly once, on first use: an
//! installed [`SettingsProvider`] wins, otherwise the machine pointer width
//! in bits (64 on a 64-bit process). Install a provider before constructing
//! any queue or pool that relies on the default.

use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::OnceLock;

const BITS_PER_BYTE: usize = 8;

/// Settings a host can supply to override built-in defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    pub segment_size: usize,
}

/// External settings source consulted once when defaults are resolved.
pub trait SettingsProvider: Send + Sync {
    fn try_get(&self) -> Option<RuntimeSettings>;
}

static PROVIDER: RwLock<Option<Box<dyn SettingsProvider>>> = RwLock::new(None);
static SEGMENT_SIZE: OnceLock<usize> = OnceLock::new();

/// Installs the provider consulted when the default segment size is first
/// resolved. Returns `false` (and has no effect) if resolution has already
/// happened.
pub fn install_settings_provider(provider: Box<dyn SettingsProvider>) -> bool {
    if SEGMENT_SIZE.get().is_some() {
        return false;
    }
    *PROVIDER.write() = Some(provider);
    true
}

/// The process-wide default segment size. Always at least 1.
pub fn segment_size() -> usize {
    *SEGMENT_SIZE.get_or_init(|| {
        let settings = PROVIDER.read().as_ref().and_then(|provider| provider.try_get());
        let resolved = resolve_segment_size(settings);
        tracing::debug!(segment_size = resolved, "default segment size resolved");
        resolved
    })
}

fn resolve_segment_size(settings: Option<RuntimeSettings>) -> usize {
    settings
        .map(|settings| settings.segment_size)
        .filter(|&size| size > 0)
        .unwrap_or(std::mem::size_of::<usize>() * BITS_PER_BYTE)
}
