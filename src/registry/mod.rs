//! Process-wide pool directories.
//!
//! A registry maps an element type (or a key/element type pair) to the live
//! pools of that shape, so unrelated call sites can share pools without
//! threading handles through every signature. Only `Send + Sync` pools are
//! registrable; the directory lock guards membership only, never the pools'
//! own acquire/release paths.

pub mod keyed;
pub mod pools;

pub use keyed::KeyedPoolRegistry;
pub use pools::PoolRegistry;

use std::sync::Arc;

/// Registries track pools by identity, not equality: two handles refer to
/// the same pool exactly when they share a data pointer.
pub(crate) fn same_data<P: ?Sized>(a: &Arc<P>, b: &Arc<P>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
