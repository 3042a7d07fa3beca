//! # Frame Bitmap
//!
//! One bit per 4 KiB frame of a pool: bit `i` of the storage (word `i / 32`,
//! bit `i % 32`, low to high) is set exactly when frame `i` is handed out.
//!
//! The bitmap does not own its storage. The boot allocator keeps its words in
//! a static array; the heap allocator's words live in pages mapped by the
//! boot allocator.

/// Index of a frame within its pool.
pub type FrameIndex = u32;

const BITS_PER_WORD: u32 = u32::BITS;

/// Bitmap storage could not be used for a pool.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BitmapError {
    #[error("{words} bitmap words cannot track {frames} frames")]
    StorageTooSmall { words: usize, frames: u32 },
}

/// Free/used tracking for a fixed number of frames.
///
/// Bits at or beyond [`frames`](Self::frames) are never set and never
/// reported as free.
#[derive(Debug)]
pub struct FrameBitmap<'a> {
    words: &'a mut [u32],
    frames: u32,
}

impl<'a> FrameBitmap<'a> {
    /// Number of `u32` words needed to track `frames` frames.
    #[must_use]
    pub const fn words_for(frames: u32) -> usize {
        frames.div_ceil(BITS_PER_WORD) as usize
    }

    /// Track `frames` frames in `words`.
    ///
    /// The storage is taken as-is; call [`clear`](Self::clear) to start from
    /// an empty pool.
    ///
    /// # Errors
    /// [`BitmapError::StorageTooSmall`] if `words` has fewer than
    /// [`words_for(frames)`](Self::words_for) entries.
    pub fn new(words: &'a mut [u32], frames: u32) -> Result<Self, BitmapError> {
        if words.len() < Self::words_for(frames) {
            return Err(BitmapError::StorageTooSmall {
                words: words.len(),
                frames,
            });
        }
        Ok(Self { words, frames })
    }

    /// Number of frames tracked.
    #[must_use]
    pub const fn frames(&self) -> u32 {
        self.frames
    }

    /// The lowest free frame, scanning words in ascending order and bits
    /// from low to high.
    #[must_use]
    pub fn find_free(&self) -> Option<FrameIndex> {
        let (word, bits) = self
            .tracked_words()
            .iter()
            .enumerate()
            .find(|(_, bits)| **bits != u32::MAX)?;
        #[allow(clippy::cast_possible_truncation)]
        let frame = word as u32 * BITS_PER_WORD + bits.trailing_ones();
        (frame < self.frames).then_some(frame)
    }

    /// Set (`used = true`) or clear the bit of `frame`.
    ///
    /// The caller keeps `frame` in range; this is only checked in debug builds.
    pub fn mark(&mut self, frame: FrameIndex, used: bool) {
        debug_assert!(frame < self.frames, "frame {frame} out of range");
        let (word, mask) = Self::locate(frame);
        if used {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    /// `true` if `frame` is allocated. Out-of-range frames read as free.
    #[must_use]
    pub fn is_used(&self, frame: FrameIndex) -> bool {
        if frame >= self.frames {
            return false;
        }
        let (word, mask) = Self::locate(frame);
        self.words[word] & mask != 0
    }

    /// Number of allocated frames.
    #[must_use]
    pub fn used_count(&self) -> u32 {
        self.tracked_words().iter().copied().map(u32::count_ones).sum()
    }

    /// Number of free frames.
    #[must_use]
    pub fn free_count(&self) -> u32 {
        self.frames - self.used_count()
    }

    /// Mark every frame free.
    pub fn clear(&mut self) {
        let n = Self::words_for(self.frames);
        self.words[..n].fill(0);
    }

    /// The words as stored, e.g. for copying into relocated storage.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        self.tracked_words()
    }

    fn tracked_words(&self) -> &[u32] {
        &self.words[..Self::words_for(self.frames)]
    }

    const fn locate(frame: FrameIndex) -> (usize, u32) {
        (
            (frame / BITS_PER_WORD) as usize,
            1 << (frame % BITS_PER_WORD),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_free_first() {
        let mut words = [0u32; 1];
        let mut bm = FrameBitmap::new(&mut words, 8).unwrap();
        bm.mark(0, true);
        bm.mark(1, true);
        bm.mark(3, true);
        assert_eq!(bm.find_free(), Some(2));
        assert_eq!(bm.used_count(), 3);
        assert_eq!(bm.free_count(), 5);
    }

    #[test]
    fn scans_across_words() {
        let mut words = [u32::MAX, 0b1011];
        let bm = FrameBitmap::new(&mut words, 64).unwrap();
        assert_eq!(bm.find_free(), Some(34));
    }

    #[test]
    fn bits_past_frame_count_are_never_free() {
        let mut words = [0u32; 2];
        let mut bm = FrameBitmap::new(&mut words, 3).unwrap();
        for f in 0..3 {
            bm.mark(f, true);
        }
        assert_eq!(bm.find_free(), None);
        assert!(!bm.is_used(3));
        assert_eq!(bm.free_count(), 0);

        bm.mark(1, false);
        assert_eq!(bm.find_free(), Some(1));
    }

    #[test]
    fn full_words_exhaust() {
        let mut words = [u32::MAX; 2];
        let bm = FrameBitmap::new(&mut words, 64).unwrap();
        assert_eq!(bm.find_free(), None);
    }

    #[test]
    fn storage_size_is_checked() {
        assert_eq!(FrameBitmap::words_for(0), 0);
        assert_eq!(FrameBitmap::words_for(32), 1);
        assert_eq!(FrameBitmap::words_for(33), 2);

        let mut words = [0u32; 1];
        assert_eq!(
            FrameBitmap::new(&mut words, 33).unwrap_err(),
            BitmapError::StorageTooSmall { words: 1, frames: 33 }
        );
    }

    #[test]
    fn clear_resets_tracked_words() {
        let mut words = [u32::MAX, u32::MAX, 0xAAAA];
        {
            let mut bm = FrameBitmap::new(&mut words, 40).unwrap();
            bm.clear();
            assert_eq!(bm.used_count(), 0);
            assert_eq!(bm.words(), &[0, 0]);
        }
        assert_eq!(words[2], 0xAAAA, "words beyond the pool are left alone");
    }
}
