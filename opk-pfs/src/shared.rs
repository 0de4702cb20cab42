//! Lock-free access to one image buffer from multiple workers.
//!
//! The layout plan partitions the image into disjoint byte ranges: each
//! signature slot has exactly one writer, each sector has exactly one
//! encryptor, and reads during signing target data blocks that no worker
//! writes. Under that discipline no synchronization is needed beyond the
//! join at the end of each parallel stage.

use std::marker::PhantomData;

pub(crate) struct SharedSlice<'a> {
    ptr: *mut u8,
    len: usize,
    _lifetime: PhantomData<&'a mut [u8]>,
}

// SAFETY: workers only touch byte ranges handed to them by the layout plan,
// which assigns at most one writer per range; readers never overlap a
// concurrently written range.
unsafe impl Send for SharedSlice<'_> {}
unsafe impl Sync for SharedSlice<'_> {}

impl<'a> SharedSlice<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
            _lifetime: PhantomData,
        }
    }

    /// Copy `buf.len()` bytes starting at `off` into `buf`.
    ///
    /// # Safety
    ///
    /// The source range must not overlap any concurrent write.
    pub unsafe fn read_into(&self, off: usize, buf: &mut [u8]) {
        assert!(off + buf.len() <= self.len);
        std::ptr::copy_nonoverlapping(self.ptr.add(off), buf.as_mut_ptr(), buf.len());
    }

    /// Copy `data` into the buffer at `off`.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the destination range.
    pub unsafe fn write(&self, off: usize, data: &[u8]) {
        assert!(off + data.len() <= self.len);
        std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(off), data.len());
    }

    /// Borrow a mutable subrange.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the range for the lifetime
    /// of the returned slice.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, off: usize, len: usize) -> &mut [u8] {
        assert!(off + len <= self.len);
        std::slice::from_raw_parts_mut(self.ptr.add(off), len)
    }
}
