//! Instance creation strategies

use std::fmt;
use std::marker::PhantomData;

/// Produces new instances from a prototype's template
///
/// `create` must return an instance in the deactivated state: structurally
/// equivalent to the template, not placed, not activated. `dispose` is called
/// for every instance the pool destroys.
pub trait Factory<T>: Send + Sync {
    fn create(&self, prototype: &T) -> T;

    fn dispose(&self, instance: T) {
        drop(instance);
    }
}

/// Factory that clones the template
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{CloneFactory, Factory};
///
/// let factory = CloneFactory;
/// assert_eq!(factory.create(&vec![1, 2, 3]), vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CloneFactory;

impl<T: Clone> Factory<T> for CloneFactory {
    fn create(&self, prototype: &T) -> T {
        prototype.clone()
    }
}

/// Factory backed by a closure, for instances that need custom allocation
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{Factory, FnFactory};
///
/// let factory = FnFactory::new(|template: &Vec<u8>| Vec::with_capacity(template.capacity()));
/// let instance = factory.create(&Vec::with_capacity(64));
/// assert!(instance.capacity() >= 64);
/// assert!(instance.is_empty());
/// ```
pub struct FnFactory<T, F> {
    create: F,
    _phantom: PhantomData<fn(&T) -> T>,
}

impl<T, F> FnFactory<T, F>
where
    F: Fn(&T) -> T + Send + Sync,
{
    pub fn new(create: F) -> Self {
        Self {
            create,
            _phantom: PhantomData,
        }
    }
}

impl<T, F> Factory<T> for FnFactory<T, F>
where
    F: Fn(&T) -> T + Send + Sync,
{
    fn create(&self, prototype: &T) -> T {
        (self.create)(prototype)
    }
}

impl<T, F> fmt::Debug for FnFactory<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnFactory")
    }
}
