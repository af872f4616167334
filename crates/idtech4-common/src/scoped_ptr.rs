// scoped_ptr.rs -- Single-owner holder for objects that cross the boundary
//
// Holds zero or one heap object. Whatever path tears the holder down
// (explicit dispose, reset, or drop) frees the object exactly once.

use crate::error::{BoundaryError, BoundaryResult};

pub struct ScopedPtr<T: ?Sized> {
    ptr: Option<Box<T>>,
}

impl<T: ?Sized> ScopedPtr<T> {
    /// An empty holder.
    pub const fn new() -> Self {
        Self { ptr: None }
    }

    pub fn from_box(value: Box<T>) -> Self {
        Self { ptr: Some(value) }
    }

    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// Borrow the held object. Fails with `Disposed` on an empty holder,
    /// every time it is called.
    pub fn get(&self) -> BoundaryResult<&T> {
        self.ptr.as_deref().ok_or(BoundaryError::Disposed)
    }

    pub fn get_mut(&mut self) -> BoundaryResult<&mut T> {
        self.ptr.as_deref_mut().ok_or(BoundaryError::Disposed)
    }

    /// Raw view of the held object, null when empty. Never fails.
    pub fn as_ptr(&self) -> *const T
    where
        T: Sized,
    {
        match self.ptr.as_deref() {
            Some(value) => value as *const T,
            None => std::ptr::null(),
        }
    }

    /// Transfer ownership out, leaving the holder empty. Releasing an empty
    /// holder returns `None` and is not a fault.
    pub fn release(&mut self) -> Option<Box<T>> {
        self.ptr.take()
    }

    /// Free the current object (if any) and take ownership of `value`.
    /// A `Box` is uniquely owned, so the incoming value can never be the one
    /// already held; see `reset_raw` for the raw-pointer form.
    pub fn reset(&mut self, value: Option<Box<T>>) {
        self.ptr = value;
    }

    /// Take ownership of a raw pointer produced by `Box::into_raw`.
    ///
    /// Resetting to the pointer already held is a no-op, so a self-reset
    /// never double frees.
    ///
    /// # Safety
    /// `raw` must be null or come from `Box::into_raw` and must not be owned
    /// by anything else (unless it is the pointer this holder already owns).
    pub unsafe fn reset_raw(&mut self, raw: *mut T)
    where
        T: Sized,
    {
        if let Some(current) = self.ptr.as_deref() {
            if std::ptr::eq(current, raw) {
                return;
            }
        }
        self.ptr = if raw.is_null() {
            None
        } else {
            Some(Box::from_raw(raw))
        };
    }

    /// Deterministic teardown. Safe to call any number of times; only the
    /// first call with a held object frees anything.
    pub fn dispose(&mut self) {
        self.ptr = None;
    }
}

impl<T: ?Sized> Default for ScopedPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<T> for ScopedPtr<T> {
    fn from(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized + std::fmt::Debug> std::fmt::Debug for ScopedPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ptr.as_deref() {
            Some(value) => f.debug_tuple("ScopedPtr").field(&value).finish(),
            None => f.write_str("ScopedPtr(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<u32>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_release_on_empty_is_noop() {
        let mut p: ScopedPtr<i32> = ScopedPtr::new();
        assert!(p.release().is_none());
        assert!(p.release().is_none());
        assert!(p.is_empty());
    }

    #[test]
    fn test_get_on_empty_is_disposed_every_time() {
        let mut p: ScopedPtr<i32> = ScopedPtr::new();
        for _ in 0..3 {
            assert_eq!(p.get().unwrap_err(), BoundaryError::Disposed);
            assert_eq!(p.get_mut().unwrap_err(), BoundaryError::Disposed);
        }
        assert!(p.as_ptr().is_null());
    }

    #[test]
    fn test_reset_frees_previous_once() {
        let drops = Rc::new(Cell::new(0));
        let mut p = ScopedPtr::from(DropCounter(drops.clone()));
        p.reset(Some(Box::new(DropCounter(drops.clone()))));
        assert_eq!(drops.get(), 1);
        p.reset(None);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn test_self_reset_raw_does_not_double_free() {
        let drops = Rc::new(Cell::new(0));
        let mut p = ScopedPtr::from(DropCounter(drops.clone()));
        let raw = p.as_ptr() as *mut DropCounter;
        unsafe { p.reset_raw(raw) };
        assert_eq!(drops.get(), 0);
        drop(p);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_dispose_then_drop_releases_once() {
        let drops = Rc::new(Cell::new(0));
        let mut p = ScopedPtr::from(DropCounter(drops.clone()));
        p.dispose();
        p.dispose();
        assert_eq!(drops.get(), 1);
        drop(p);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_release_moves_ownership_out() {
        let drops = Rc::new(Cell::new(0));
        let mut p = ScopedPtr::from(DropCounter(drops.clone()));
        let owned = p.release().unwrap();
        drop(p);
        assert_eq!(drops.get(), 0);
        drop(owned);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_unsized_holder() {
        let mut p: ScopedPtr<dyn Fn() -> i32> = ScopedPtr::from_box(Box::new(|| 7));
        assert_eq!((p.get().unwrap())(), 7);
        p.dispose();
        assert!(p.get().is_err());
    }
}
