//! Prototype identities and instance handles

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROTOTYPE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a prototype. Pools are keyed by this, never by the
/// template's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrototypeId(u64);

impl PrototypeId {
    fn next() -> Self {
        Self(NEXT_PROTOTYPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrototypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prototype#{}", self.0)
    }
}

/// Identity of one pool instance
///
/// Every `Pool` gets its own id, so two pools built from the same prototype
/// (or a pool re-created after shutdown) never accept each other's handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// The template a pool produces instances from
///
/// Cloning a `Prototype` shares its identity. Two prototypes built from equal
/// values are still different prototypes and get different pools.
///
/// # Examples
///
/// ```
/// use esox_spawnpool::Prototype;
///
/// let a = Prototype::new(vec![0u8; 16]);
/// let b = Prototype::new(vec![0u8; 16]);
///
/// assert_ne!(a.id(), b.id());
/// assert_eq!(a.id(), a.clone().id());
/// ```
pub struct Prototype<T> {
    id: PrototypeId,
    name: Option<Arc<str>>,
    template: Arc<T>,
}

impl<T> Prototype<T> {
    /// Create a prototype with a fresh identity
    pub fn new(template: T) -> Self {
        Self {
            id: PrototypeId::next(),
            name: None,
            template: Arc::new(template),
        }
    }

    /// Create a named prototype. The name is used in logs and metric labels.
    pub fn named(name: impl Into<Arc<str>>, template: T) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(template)
        }
    }

    pub fn id(&self) -> PrototypeId {
        self.id
    }

    pub fn template(&self) -> &T {
        &self.template
    }

    /// Display label: the name if one was given, otherwise the id
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => self.id.to_string(),
        }
    }
}

impl<T> Clone for Prototype<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            template: Arc::clone(&self.template),
        }
    }
}

impl<T> PartialEq for Prototype<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Prototype<T> {}

impl<T> Hash for Prototype<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Prototype<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prototype")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Names one instance produced by a pool
///
/// Handles are cheap to copy. Once the instance behind a handle has been
/// destroyed the handle stops resolving, even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    pub(crate) prototype: PrototypeId,
    pub(crate) owner: PoolId,
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl InstanceHandle {
    /// The prototype whose pool produced this instance. Registries route by it.
    pub fn prototype(&self) -> PrototypeId {
        self.prototype
    }

    /// The pool that produced this instance
    pub fn owner(&self) -> PoolId {
        self.owner
    }
}
