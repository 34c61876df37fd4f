
//! Free lists of reusable buffers, shared between tile jobs.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};
use crate::error::Result;


/// A free list of values that are expensive to allocate.
/// Taking from an empty pool creates a new value instead of waiting.
#[derive(Debug, Default)]
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
}

/// A value taken from a pool. Returns to the pool when dropped.
#[derive(Debug)]
pub struct Pooled<'p, T: Default> {
    pool: &'p Pool<T>,
    value: T,
}

impl<T> Pool<T> {

    /// An empty pool.
    pub fn new() -> Self {
        Pool { free: Mutex::new(Vec::new()) }
    }

    /// Take a free value, or create a new one if none is available.
    /// The value keeps whatever contents it had when it was returned.
    pub fn take(&self, create: impl FnOnce() -> Result<T>) -> Result<Pooled<'_, T>> where T: Default {
        let reused = self.lock().pop();

        let value = match reused {
            Some(value) => value,
            None => create()?,
        };

        Ok(Pooled { pool: self, value })
    }

    /// Number of values waiting to be reused.
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    /// Drop all values waiting to be reused.
    pub fn clear(&self) {
        self.lock().clear();
    }

    // a job that panicked while holding the lock cannot leave the list inconsistent
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Default> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        let value = std::mem::take(&mut self.value);
        self.pool.lock().push(value);
    }
}

impl<T: Default> Deref for Pooled<'_, T> {
    type Target = T;
    fn deref(&self) -> &T { &self.value }
}

impl<T: Default> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T { &mut self.value }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;

    #[test]
    fn values_are_reused(){
        let pool: Pool<Vec<u8>> = Pool::new();

        {
            let mut first = pool.take(|| Ok(vec![0; 16])).unwrap();
            first[0] = 7;
            assert_eq!(pool.available(), 0);
        }

        assert_eq!(pool.available(), 1);

        let reused = pool.take(|| panic!("must reuse the returned value")).unwrap();
        assert_eq!(reused.len(), 16);
        assert_eq!(reused[0], 7);
    }

    #[test]
    fn grows_instead_of_blocking(){
        let pool: Pool<Vec<u8>> = Pool::new();
        let a = pool.take(|| Ok(Vec::new())).unwrap();
        let b = pool.take(|| Ok(Vec::new())).unwrap();

        drop(a);
        drop(b);
        assert_eq!(pool.available(), 2);

        pool.clear();
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn failed_creation_is_reported(){
        let pool: Pool<Vec<u8>> = Pool::new();
        let result = pool.take(|| Err(Error::resource("test")));
        assert!(matches!(result, Err(Error::Resource(_))));
        assert_eq!(pool.available(), 0);
    }
}
