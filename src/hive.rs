//! A chunked pool of fixed-width slots with stable 32-bit indices.
//!
//! The pool grows by appending chunks and never reallocates, so a slot's
//! bytes stay at one address for the pool's whole life. Freed slots form a
//! LIFO free list threaded through their own payload bytes and are reused
//! before any new slot is handed out.

use bitvec::vec::BitVec;
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::{mem, slice};

/// Number of slots in a single chunk.
pub const CHUNK_CAPACITY: usize = 1024;

const FREE_LINK_SIZE: usize = mem::size_of::<u32>();

/// Encoded "no further free slot" link.
const NO_LINK: u32 = u32::MAX;

/// A stable index of one hive slot: chunk ordinal in the low 16 bits, slot
/// ordinal within the chunk in the high 16 bits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HiveIndex(u32);

impl HiveIndex {
    pub(crate) fn new(chunk: u16, slot: u16) -> HiveIndex {
        HiveIndex(chunk as u32 | (slot as u32) << 16)
    }

    pub(crate) fn chunk(self) -> usize {
        (self.0 & 0xffff) as usize
    }

    pub(crate) fn slot(self) -> usize {
        (self.0 >> 16) as usize
    }

    /// Raw 32-bit form, as embedded in entity handles.
    pub fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuilds an index from [`to_bits`](Self::to_bits) output.
    pub fn from_bits(bits: u32) -> HiveIndex {
        HiveIndex(bits)
    }
}

/// Effective slot stride for a payload width: wide enough that a freed
/// payload can always hold the encoded free-list link.
pub(crate) const fn slot_stride(payload: usize) -> usize {
    if payload < FREE_LINK_SIZE {
        FREE_LINK_SIZE
    } else {
        payload
    }
}

struct Chunk {
    data: NonNull<u8>,
    layout: Layout,
    /// Occupancy of the slots handed out so far; freed slots drop back to
    /// zero.
    live: BitVec,
    generations: Vec<u16>,
    /// High-water mark of slots ever handed out from this chunk.
    len: usize,
}

impl Chunk {
    fn new(stride: usize, align: usize) -> Chunk {
        let layout = match Layout::from_size_align(stride * CHUNK_CAPACITY, align) {
            Ok(layout) => layout,
            Err(_) => panic!("invalid chunk layout: stride {stride}, align {align}"),
        };
        // Safety: the layout has non-zero size (stride >= FREE_LINK_SIZE).
        let data = unsafe {
            match NonNull::new(alloc_zeroed(layout)) {
                Some(ptr) => ptr,
                None => handle_alloc_error(layout),
            }
        };

        Chunk {
            data,
            layout,
            live: BitVec::repeat(false, CHUNK_CAPACITY),
            generations: vec![0; CHUNK_CAPACITY],
            len: 0,
        }
    }

    fn slot_ptr(&self, slot: usize, stride: usize) -> *mut u8 {
        debug_assert!(slot < CHUNK_CAPACITY);
        // Safety: every slot lies within the chunk's allocation.
        unsafe { self.data.as_ptr().add(slot * stride) }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // Safety: `data` was allocated with `layout` in `Chunk::new`.
        unsafe { dealloc(self.data.as_ptr(), self.layout) };
    }
}

// Safety: a chunk exclusively owns its buffer, and payloads are plain bytes
// of `Copy` kinds.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

/// A pool of fixed-width slots with a LIFO free list and chunked growth.
pub struct Hive {
    chunks: Vec<Chunk>,
    next_free: Option<HiveIndex>,
    payload: usize,
    stride: usize,
    align: usize,
    len: usize,
}

impl Hive {
    /// Creates a pool of `payload`-byte slots whose chunk buffers are
    /// aligned to `align`.
    pub fn new(payload: usize, align: usize) -> Hive {
        assert!(align.is_power_of_two());
        Hive {
            chunks: Vec::new(),
            next_free: None,
            payload,
            stride: slot_stride(payload),
            align,
            len: 0,
        }
    }

    /// Width of one slot's payload in bytes.
    pub fn payload_width(&self) -> usize {
        self.payload
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if `index` refers to a live slot.
    pub fn contains(&self, index: HiveIndex) -> bool {
        self.chunks
            .get(index.chunk())
            .map_or(false, |c| c.live.get(index.slot()).map_or(false, |bit| *bit))
    }

    /// Generation of a slot, bumped each time the slot is freed.
    /// Panics if `index` is out of range.
    pub fn generation(&self, index: HiveIndex) -> u16 {
        self.chunks[index.chunk()].generations[index.slot()]
    }

    /// Allocates a slot and returns its stable index along with its payload
    /// bytes. The head of the free list is reused when one exists;
    /// otherwise the last chunk grows, with a fresh chunk appended once it
    /// is full.
    ///
    /// The returned bytes are zeroed for a slot handed out for the first
    /// time and stale otherwise; the caller is expected to overwrite them.
    pub fn allocate(&mut self) -> (HiveIndex, &mut [u8]) {
        let index = match self.next_free.take() {
            Some(head) => {
                self.next_free = self.read_link(head);
                head
            }
            None => self.grow(),
        };

        let stride = self.stride;
        let chunk = &mut self.chunks[index.chunk()];
        chunk.live.set(index.slot(), true);
        self.len += 1;

        let ptr = chunk.slot_ptr(index.slot(), stride);
        // Safety: the slot is in bounds and now exclusively ours.
        let row = unsafe { slice::from_raw_parts_mut(ptr, self.payload) };
        (index, row)
    }

    fn grow(&mut self) -> HiveIndex {
        #[cold]
        #[inline(never)]
        fn assert_failed() -> ! {
            panic!(
                "hive is out of slots: the maximum of {} chunks is reached",
                u16::MAX as usize + 1
            );
        }

        let last_full = self.chunks.last().map_or(true, |c| c.len == CHUNK_CAPACITY);
        if last_full {
            if self.chunks.len() > u16::MAX as usize {
                assert_failed();
            }
            self.chunks.push(Chunk::new(self.stride, self.align));
        }

        let chunk_ordinal = self.chunks.len() - 1;
        let chunk = &mut self.chunks[chunk_ordinal];
        let slot = chunk.len;
        chunk.len += 1;
        HiveIndex::new(chunk_ordinal as u16, slot as u16)
    }

    /// Resolves `index` to its payload bytes.
    /// Panics if the index is out of range or refers to a freed slot.
    pub fn get(&self, index: HiveIndex) -> &[u8] {
        self.check_live(index);
        let ptr = self.chunks[index.chunk()].slot_ptr(index.slot(), self.stride);
        // Safety: live slots are initialized and in bounds.
        unsafe { slice::from_raw_parts(ptr, self.payload) }
    }

    /// Mutable counterpart of [`get`](Self::get).
    pub fn get_mut(&mut self, index: HiveIndex) -> &mut [u8] {
        self.check_live(index);
        let ptr = self.chunks[index.chunk()].slot_ptr(index.slot(), self.stride);
        // Safety: live slots are initialized and in bounds, and `&mut self`
        // makes this the only access.
        unsafe { slice::from_raw_parts_mut(ptr, self.payload) }
    }

    /// Raw pointer to a live slot's payload. The pointer stays valid for
    /// the hive's life; mutating through it requires that no other access
    /// to the slot exists.
    pub(crate) fn row_ptr(&self, index: HiveIndex) -> NonNull<u8> {
        self.check_live(index);
        let ptr = self.chunks[index.chunk()].slot_ptr(index.slot(), self.stride);
        // Safety: chunk buffers are never null.
        unsafe { NonNull::new_unchecked(ptr) }
    }

    fn check_live(&self, index: HiveIndex) {
        #[cold]
        #[inline(never)]
        fn assert_failed(index: HiveIndex) -> ! {
            panic!("hive index {index:?} is out of range or freed");
        }

        if !self.contains(index) {
            assert_failed(index);
        }
    }

    /// Frees a live slot: its payload's first bytes are overwritten with
    /// the encoded previous free-list head, its generation is bumped, and
    /// it becomes the new head.
    ///
    /// Panics if the slot is already freed or out of range.
    pub fn free(&mut self, index: HiveIndex) {
        #[cold]
        #[inline(never)]
        fn assert_failed(index: HiveIndex) -> ! {
            panic!("double free of hive index {index:?}");
        }

        if !self.contains(index) {
            assert_failed(index);
        }

        self.write_link(index, self.next_free);
        let chunk = &mut self.chunks[index.chunk()];
        chunk.live.set(index.slot(), false);
        chunk.generations[index.slot()] = chunk.generations[index.slot()].wrapping_add(1);
        self.next_free = Some(index);
        self.len -= 1;
    }

    fn read_link(&self, index: HiveIndex) -> Option<HiveIndex> {
        let ptr = self.chunks[index.chunk()].slot_ptr(index.slot(), self.stride);
        // Safety: every slot is at least FREE_LINK_SIZE bytes wide; the
        // link is not necessarily aligned within the row.
        let bits = unsafe { (ptr as *const u32).read_unaligned() };
        (bits != NO_LINK).then(|| HiveIndex(bits))
    }

    fn write_link(&mut self, index: HiveIndex, link: Option<HiveIndex>) {
        let bits = link.map_or(NO_LINK, |l| l.0);
        let ptr = self.chunks[index.chunk()].slot_ptr(index.slot(), self.stride);
        // Safety: see `read_link`.
        unsafe { (ptr as *mut u32).write_unaligned(bits) };
    }

    /// Iterates over the payloads of all live slots in chunk-then-slot
    /// order. Freed slots are skipped via the per-chunk occupancy bitmap,
    /// so the sequence stays exact after removals.
    pub fn iter(&self) -> Rows {
        Rows {
            chunks: self.chunks.iter(),
            cur: None,
            payload: self.payload,
            stride: self.stride,
        }
    }

    /// Raw counterpart of [`iter`](Self::iter), yielding slot pointers.
    /// Mutating through them requires that no other access to the slots
    /// exists.
    pub(crate) fn iter_ptrs(&self) -> RowPtrs {
        RowPtrs {
            chunks: self.chunks.iter(),
            cur: None,
            stride: self.stride,
        }
    }
}

/// Iterator over the live rows of a [`Hive`].
pub struct Rows<'a> {
    chunks: slice::Iter<'a, Chunk>,
    cur: Option<(&'a Chunk, bitvec::slice::IterOnes<'a, usize, bitvec::order::Lsb0>)>,
    payload: usize,
    stride: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((chunk, ones)) = &mut self.cur {
                if let Some(slot) = ones.next() {
                    let ptr = chunk.slot_ptr(slot, self.stride);
                    // Safety: the slot is live, hence initialized and in
                    // bounds.
                    return Some(unsafe { slice::from_raw_parts(ptr, self.payload) });
                }
            }
            let chunk = self.chunks.next()?;
            self.cur = Some((chunk, chunk.live.iter_ones()));
        }
    }
}

pub(crate) struct RowPtrs<'a> {
    chunks: slice::Iter<'a, Chunk>,
    cur: Option<(&'a Chunk, bitvec::slice::IterOnes<'a, usize, bitvec::order::Lsb0>)>,
    stride: usize,
}

impl<'a> Iterator for RowPtrs<'a> {
    type Item = NonNull<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((chunk, ones)) = &mut self.cur {
                if let Some(slot) = ones.next() {
                    let ptr = chunk.slot_ptr(slot, self.stride);
                    // Safety: chunk buffers are never null.
                    return Some(unsafe { NonNull::new_unchecked(ptr) });
                }
            }
            let chunk = self.chunks.next()?;
            self.cur = Some((chunk, chunk.live.iter_ones()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(hive: &mut Hive, value: u8) -> HiveIndex {
        let (index, row) = hive.allocate();
        row.fill(value);
        index
    }

    #[test]
    fn allocate_and_resolve() {
        let mut hive = Hive::new(8, 4);

        let a = fill(&mut hive, 1);
        let b = fill(&mut hive, 2);

        assert_eq!(hive.len(), 2);
        assert_eq!(hive.get(a), &[1; 8]);
        assert_eq!(hive.get(b), &[2; 8]);
        assert_ne!(a, b);
    }

    #[test]
    fn free_list_is_lifo() {
        let mut hive = Hive::new(16, 4);

        let a = fill(&mut hive, 1);
        let b = fill(&mut hive, 2);
        let c = fill(&mut hive, 3);

        hive.free(b);
        hive.free(a);

        // Most recently freed first, then the older one, then fresh growth.
        assert_eq!(hive.allocate().0, a);
        assert_eq!(hive.allocate().0, b);
        let d = hive.allocate().0;
        assert_ne!(d, a);
        assert_ne!(d, b);
        assert_ne!(d, c);
    }

    #[test]
    fn grows_past_one_chunk() {
        let mut hive = Hive::new(4, 4);

        let indices: Vec<_> = (0..CHUNK_CAPACITY + 5)
            .map(|i| {
                let (index, row) = hive.allocate();
                row.copy_from_slice(&(i as u32).to_ne_bytes());
                index
            })
            .collect();

        assert_eq!(hive.len(), CHUNK_CAPACITY + 5);
        assert_eq!(indices[CHUNK_CAPACITY].chunk(), 1);
        assert_eq!(indices[CHUNK_CAPACITY].slot(), 0);

        // Early slots kept their bytes across the chunk append.
        assert_eq!(hive.get(indices[0]), &0u32.to_ne_bytes());
        assert_eq!(
            hive.get(indices[CHUNK_CAPACITY + 4]),
            &((CHUNK_CAPACITY + 4) as u32).to_ne_bytes()
        );
    }

    #[test]
    fn iteration_skips_freed_slots() {
        let mut hive = Hive::new(4, 4);

        let a = fill(&mut hive, 1);
        let _b = fill(&mut hive, 2);
        let c = fill(&mut hive, 3);

        hive.free(a);
        hive.free(c);

        let visited: Vec<u8> = hive.iter().map(|row| row[0]).collect();
        assert_eq!(visited, [2]);

        // A reused slot shows up again.
        fill(&mut hive, 4);
        let visited: Vec<u8> = hive.iter().map(|row| row[0]).collect();
        assert_eq!(visited, [2, 4]);
    }

    #[test]
    fn generations_bump_on_free() {
        let mut hive = Hive::new(4, 4);

        let a = fill(&mut hive, 1);
        assert_eq!(hive.generation(a), 0);

        hive.free(a);
        assert_eq!(hive.generation(a), 1);

        let reused = fill(&mut hive, 2);
        assert_eq!(reused, a);
        assert_eq!(hive.generation(reused), 1);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_is_detected() {
        let mut hive = Hive::new(4, 4);
        let a = fill(&mut hive, 1);
        hive.free(a);
        hive.free(a);
    }

    #[test]
    #[should_panic(expected = "out of range or freed")]
    fn get_of_freed_slot_panics() {
        let mut hive = Hive::new(4, 4);
        let a = fill(&mut hive, 1);
        hive.free(a);
        hive.get(a);
    }

    #[test]
    fn narrow_payloads_still_hold_the_link() {
        // Payload narrower than the link widens the stride, not the payload.
        let mut hive = Hive::new(1, 1);

        let a = fill(&mut hive, 7);
        let b = fill(&mut hive, 8);
        hive.free(a);
        hive.free(b);

        assert_eq!(hive.allocate().0, b);
        assert_eq!(hive.allocate().0, a);
        assert_eq!(hive.get(a).len(), 1);
    }
}
