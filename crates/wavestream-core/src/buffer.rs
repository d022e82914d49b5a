//! Sample buffers with readable padding on both sides.
//!
//! Index 0 is the first logical value. Negative indices down to `-padding`
//! and indices up to `len + padding - 1` address the padding, so
//! interpolators can look a few values past either end of a block without
//! bounds juggling.

use std::ops::{Index, IndexMut};

/// Owned, zero-initialized sample buffer with symmetric padding.
#[derive(Clone, PartialEq)]
pub struct PaddedBuffer {
    data: Box<[f32]>,
    padding: usize,
}

impl PaddedBuffer {
    /// Allocate `len` logical values plus `padding` values on each side.
    pub fn zeroed(len: usize, padding: usize) -> Self {
        Self {
            data: vec![0.0; len + 2 * padding].into_boxed_slice(),
            padding,
        }
    }

    /// Number of logical values.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - 2 * self.padding
    }

    /// True if there are no logical values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Padding on each side.
    #[inline]
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Lowest valid signed index.
    #[inline]
    pub fn first_index(&self) -> isize {
        -(self.padding as isize)
    }

    /// One past the highest valid signed index.
    #[inline]
    pub fn end_index(&self) -> isize {
        (self.len() + self.padding) as isize
    }

    /// Whether `index` addresses a logical or padding value.
    #[inline]
    pub fn contains(&self, index: isize) -> bool {
        index >= self.first_index() && index < self.end_index()
    }

    /// Value at a signed index, `None` outside the padded range.
    #[inline]
    pub fn get(&self, index: isize) -> Option<f32> {
        if self.contains(index) {
            Some(self.data[self.physical(index)])
        } else {
            None
        }
    }

    /// `n` values starting at signed index `start`.
    ///
    /// # Panics
    /// If the range leaves the padded buffer.
    pub fn slice(&self, start: isize, n: usize) -> &[f32] {
        let begin = self.physical(start);
        &self.data[begin..begin + n]
    }

    /// Logical values without padding.
    pub fn logical(&self) -> &[f32] {
        &self.data[self.padding..self.padding + self.len()]
    }

    /// Every value including both paddings.
    pub fn raw(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to every value including both paddings.
    pub fn raw_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn physical(&self, index: isize) -> usize {
        let physical = index + self.padding as isize;
        assert!(
            physical >= 0,
            "index {} below padding {}",
            index,
            self.padding
        );
        physical as usize
    }
}

impl Index<isize> for PaddedBuffer {
    type Output = f32;

    #[inline]
    fn index(&self, index: isize) -> &f32 {
        &self.data[self.physical(index)]
    }
}

impl IndexMut<isize> for PaddedBuffer {
    #[inline]
    fn index_mut(&mut self, index: isize) -> &mut f32 {
        let physical = self.physical(index);
        &mut self.data[physical]
    }
}

impl std::fmt::Debug for PaddedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaddedBuffer")
            .field("len", &self.len())
            .field("padding", &self.padding)
            .finish()
    }
}
