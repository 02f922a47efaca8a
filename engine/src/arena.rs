//! Constant-time arena allocator over a fixed-capacity region.
//!
//! The region is carved into fragments. Each fragment starts with a header
//! of four machine words (`prev`, `next`, `size`, `used`) linking it to its
//! address neighbours; the payload follows. Free fragments additionally keep
//! their free-list links in the first two payload words.
//!
//! Free fragments are segregated into power-of-two bins: bin `i` holds the
//! fragments whose size lies in `[MIN << i, MIN << (i + 1))`. A bitmask of
//! non-empty bins finds the smallest sufficient bin with two bit operations,
//! so `allocate` and `free` cost the same regardless of heap history.
//!
//! Every fragment size, headers included, is a multiple of
//! [`FRAGMENT_SIZE_MIN`], and the sizes of all fragments sum to
//! [`Arena::capacity`]. Allocated sizes are reported in whole fragments, which
//! keeps `allocated() + free_bytes() == capacity()` exact.
//!
//! The arena is not synchronized. It is only sound under the guest's
//! single-threaded dispatch.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr::NonNull;

use fusion_primitives::{ModuleError, ModuleResult};

const WORD: usize = core::mem::size_of::<usize>();

/// Alignment of every returned pointer, and the size of a fragment header.
pub const ALIGNMENT: usize = WORD * 4;

/// Smallest fragment: a header plus room for the two free-list links.
pub const FRAGMENT_SIZE_MIN: usize = ALIGNMENT * 2;

/// Largest fragment the bin layout can describe.
pub const FRAGMENT_SIZE_MAX: usize = (usize::MAX >> 1) + 1;

const NUM_BINS: usize = usize::BITS as usize;

/// Null link.
const NIL: usize = usize::MAX;

// Header fields.
const PREV: usize = 0;
const NEXT: usize = WORD;
const SIZE: usize = WORD * 2;
const USED: usize = WORD * 3;

// Free-list links, stored in the payload of free fragments.
const NEXT_FREE: usize = ALIGNMENT;
const PREV_FREE: usize = ALIGNMENT + WORD;

fn log2_floor(x: usize) -> usize {
    (usize::BITS - 1 - x.leading_zeros()) as usize
}

fn log2_ceil(x: usize) -> usize {
    if x <= 1 {
        0
    } else {
        log2_floor(x - 1) + 1
    }
}

fn bin_of(size: usize) -> usize {
    log2_floor(size / FRAGMENT_SIZE_MIN)
}

/// Fragment size consumed by a request of `amount` bytes.
///
/// Returns `None` for zero-sized or unrepresentable requests.
pub fn fragment_size_for(amount: usize) -> Option<usize> {
    if amount == 0 {
        return None;
    }
    amount
        .checked_add(ALIGNMENT)
        .filter(|size| *size <= FRAGMENT_SIZE_MAX)
        .map(usize::next_power_of_two)
}

/// Allocator statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Bytes available to fragments, headers included.
    pub capacity: usize,
    /// Bytes held by live fragments, headers included.
    pub allocated: usize,
    /// High-water mark of `allocated`.
    pub peak_allocated: usize,
    /// Largest `amount` ever passed to `allocate`, successful or not.
    pub peak_request_size: usize,
    /// Non-zero requests that could not be served.
    pub oom_count: u64,
}

/// Fixed-capacity O(1) allocator owning its backing region.
pub struct Arena {
    region: Box<[u8]>,
    /// Padding in front of the first fragment to reach `ALIGNMENT`.
    lead: usize,
    bins: [usize; NUM_BINS],
    nonempty_bin_mask: usize,
    diagnostics: Diagnostics,
}

impl Arena {
    /// Create an arena managing `capacity` bytes.
    ///
    /// The usable capacity is rounded down to a multiple of
    /// [`FRAGMENT_SIZE_MIN`]. Fails if not even one fragment fits, or if
    /// the backing region cannot be allocated.
    pub fn new(capacity: usize) -> ModuleResult<Self> {
        let usable = (capacity - capacity % FRAGMENT_SIZE_MIN).min(FRAGMENT_SIZE_MAX);
        if usable < FRAGMENT_SIZE_MIN {
            return Err(ModuleError::ArenaTooSmall { capacity });
        }
        let padded = usable
            .checked_add(ALIGNMENT - 1)
            .ok_or(ModuleError::ArenaTooSmall { capacity })?;
        let mut region = Vec::new();
        region
            .try_reserve_exact(padded)
            .map_err(|_| ModuleError::AllocationFailure { requested: padded })?;
        region.resize(padded, 0u8);
        let region = region.into_boxed_slice();
        let lead = region.as_ptr().align_offset(ALIGNMENT);
        if lead >= ALIGNMENT {
            return Err(ModuleError::ArenaTooSmall { capacity });
        }

        let mut arena = Self {
            region,
            lead,
            bins: [NIL; NUM_BINS],
            nonempty_bin_mask: 0,
            diagnostics: Diagnostics {
                capacity: usable,
                ..Diagnostics::default()
            },
        };
        arena.set_link(0, PREV, None);
        arena.set_link(0, NEXT, None);
        arena.set_word(0, SIZE, usable);
        arena.set_used(0, false);
        arena.rebin(0);
        Ok(arena)
    }

    /// Allocate `amount` bytes aligned to [`ALIGNMENT`].
    ///
    /// Returns `None` when `amount` is zero or no free fragment of a
    /// sufficient bin exists. A failed request leaves live blocks untouched.
    pub fn allocate(&mut self, amount: usize) -> Option<NonNull<u8>> {
        let mut out = None;
        if amount > 0 && amount <= self.diagnostics.capacity - ALIGNMENT {
            out = self.allocate_fragment(amount);
        }
        if self.diagnostics.peak_request_size < amount {
            self.diagnostics.peak_request_size = amount;
        }
        if out.is_none() && amount > 0 {
            self.diagnostics.oom_count += 1;
        }
        out
    }

    fn allocate_fragment(&mut self, amount: usize) -> Option<NonNull<u8>> {
        let fragment_size = fragment_size_for(amount)?;
        let optimal_bin = log2_ceil(fragment_size / FRAGMENT_SIZE_MIN);
        let candidate_mask = !((1usize << optimal_bin) - 1);
        let suitable = self.nonempty_bin_mask & candidate_mask;
        let smallest = suitable & suitable.wrapping_neg();
        if smallest == 0 {
            return None;
        }

        let frag = self.bins[log2_floor(smallest)];
        self.unbin(frag);

        let leftover = self.size(frag) - fragment_size;
        self.set_word(frag, SIZE, fragment_size);
        if leftover >= FRAGMENT_SIZE_MIN {
            let rest = frag + fragment_size;
            self.set_word(rest, SIZE, leftover);
            self.set_used(rest, false);
            let after = self.link(frag, NEXT);
            self.interlink(Some(rest), after);
            self.interlink(Some(frag), Some(rest));
            self.rebin(rest);
        }

        self.diagnostics.allocated += fragment_size;
        if self.diagnostics.peak_allocated < self.diagnostics.allocated {
            self.diagnostics.peak_allocated = self.diagnostics.allocated;
        }
        self.set_used(frag, true);

        let at = self.lead + frag + ALIGNMENT;
        NonNull::new(self.region.as_mut_ptr().wrapping_add(at))
    }

    /// Release an allocation. A null pointer is a no-op.
    ///
    /// Addresses that are not live allocations of this arena are rejected
    /// and the heap is left untouched.
    pub fn free(&mut self, ptr: *mut u8) -> ModuleResult<()> {
        if ptr.is_null() {
            return Ok(());
        }
        let address = ptr as usize;
        let frag = self
            .live_fragment(address)
            .ok_or(ModuleError::InvalidFree { address })?;

        let size = self.size(frag);
        self.set_used(frag, false);
        self.diagnostics.allocated -= size;

        let prev = self.link(frag, PREV);
        let next = self.link(frag, NEXT);
        let join_left = prev.filter(|&p| !self.used(p));
        let join_right = next.filter(|&n| !self.used(n));

        match (join_left, join_right) {
            (Some(left), Some(right)) => {
                self.unbin(left);
                self.unbin(right);
                let merged = self.size(left) + size + self.size(right);
                self.set_word(left, SIZE, merged);
                self.set_word(frag, SIZE, 0);
                self.set_word(right, SIZE, 0);
                let after = self.link(right, NEXT);
                self.interlink(Some(left), after);
                self.rebin(left);
            }
            (Some(left), None) => {
                self.unbin(left);
                let merged = self.size(left) + size;
                self.set_word(left, SIZE, merged);
                self.set_word(frag, SIZE, 0);
                self.interlink(Some(left), next);
                self.rebin(left);
            }
            (None, Some(right)) => {
                self.unbin(right);
                let merged = size + self.size(right);
                self.set_word(frag, SIZE, merged);
                self.set_word(right, SIZE, 0);
                let after = self.link(right, NEXT);
                self.interlink(Some(frag), after);
                self.rebin(frag);
            }
            (None, None) => self.rebin(frag),
        }
        Ok(())
    }

    /// Bytes held by live fragments, headers included.
    pub fn allocated(&self) -> usize {
        self.diagnostics.allocated
    }

    /// Total bytes managed by the arena.
    pub fn capacity(&self) -> usize {
        self.diagnostics.capacity
    }

    /// `capacity() - allocated()`.
    pub fn free_bytes(&self) -> usize {
        self.diagnostics.capacity - self.diagnostics.allocated
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// Address of the first fragment header.
    pub fn base_address(&self) -> usize {
        self.region.as_ptr() as usize + self.lead
    }

    /// Returns true if `address` falls inside the managed region.
    pub fn contains(&self, address: usize) -> bool {
        let base = self.base_address();
        address >= base && address < base + self.diagnostics.capacity
    }

    /// Payload bytes usable behind a live allocation.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        let frag = self.live_fragment(ptr.as_ptr() as usize)?;
        Some(self.size(frag) - ALIGNMENT)
    }

    /// Payload of a live allocation.
    pub fn block(&self, ptr: NonNull<u8>) -> Option<&[u8]> {
        let frag = self.live_fragment(ptr.as_ptr() as usize)?;
        let start = self.lead + frag + ALIGNMENT;
        let end = self.lead + frag + self.size(frag);
        Some(&self.region[start..end])
    }

    /// Mutable payload of a live allocation.
    pub fn block_mut(&mut self, ptr: NonNull<u8>) -> Option<&mut [u8]> {
        let frag = self.live_fragment(ptr.as_ptr() as usize)?;
        let start = self.lead + frag + ALIGNMENT;
        let end = self.lead + frag + self.size(frag);
        Some(&mut self.region[start..end])
    }

    /// Walk the whole heap and check its structural invariants.
    ///
    /// Linear in the number of fragments; for diagnostics and tests only.
    pub fn invariants_hold(&self) -> bool {
        let capacity = self.diagnostics.capacity;
        let mut total = 0usize;
        let mut used_total = 0usize;
        let mut free_fragments = 0usize;
        let mut prev: Option<usize> = None;
        let mut prev_free = false;
        let mut cursor = Some(0usize);

        while let Some(frag) = cursor {
            let size = self.size(frag);
            if frag != total
                || size < FRAGMENT_SIZE_MIN
                || size % FRAGMENT_SIZE_MIN != 0
                || frag + size > capacity
                || self.link(frag, PREV) != prev
            {
                return false;
            }
            let used = self.used(frag);
            if used {
                used_total += size;
            } else {
                if prev_free || self.nonempty_bin_mask & (1 << bin_of(size)) == 0 {
                    return false;
                }
                free_fragments += 1;
            }
            prev_free = !used;
            total += size;
            prev = Some(frag);
            cursor = self.link(frag, NEXT);
        }
        if total != capacity || used_total != self.diagnostics.allocated {
            return false;
        }

        let mut binned = 0usize;
        for (idx, &head) in self.bins.iter().enumerate() {
            let bit_set = self.nonempty_bin_mask & (1 << idx) != 0;
            if bit_set != (head != NIL) {
                return false;
            }
            let mut node = head;
            let mut back = NIL;
            while node != NIL {
                if binned > free_fragments
                    || self.used(node)
                    || bin_of(self.size(node)) != idx
                    || self.word(node, PREV_FREE) != back
                {
                    return false;
                }
                binned += 1;
                back = node;
                node = self.word(node, NEXT_FREE);
            }
        }
        binned == free_fragments
            && self.diagnostics.peak_allocated >= self.diagnostics.allocated
    }

    // ── Fragment access ──

    /// Fragment offset of a live allocation at `address`, if it is one.
    fn live_fragment(&self, address: usize) -> Option<usize> {
        let frag = address.checked_sub(self.base_address() + ALIGNMENT)?;
        if frag % FRAGMENT_SIZE_MIN != 0 || frag > self.diagnostics.capacity - FRAGMENT_SIZE_MIN {
            return None;
        }
        let size = self.size(frag);
        let plausible = self.used(frag)
            && size >= FRAGMENT_SIZE_MIN
            && size.is_power_of_two()
            && frag + size <= self.diagnostics.capacity;
        plausible.then_some(frag)
    }

    fn word(&self, frag: usize, field: usize) -> usize {
        let at = self.lead + frag + field;
        let mut bytes = [0u8; WORD];
        bytes.copy_from_slice(&self.region[at..at + WORD]);
        usize::from_ne_bytes(bytes)
    }

    fn set_word(&mut self, frag: usize, field: usize, value: usize) {
        let at = self.lead + frag + field;
        self.region[at..at + WORD].copy_from_slice(&value.to_ne_bytes());
    }

    fn link(&self, frag: usize, field: usize) -> Option<usize> {
        match self.word(frag, field) {
            NIL => None,
            other => Some(other),
        }
    }

    fn set_link(&mut self, frag: usize, field: usize, target: Option<usize>) {
        self.set_word(frag, field, target.unwrap_or(NIL));
    }

    fn size(&self, frag: usize) -> usize {
        self.word(frag, SIZE)
    }

    fn used(&self, frag: usize) -> bool {
        self.word(frag, USED) != 0
    }

    fn set_used(&mut self, frag: usize, used: bool) {
        self.set_word(frag, USED, usize::from(used));
    }

    fn interlink(&mut self, left: Option<usize>, right: Option<usize>) {
        if let Some(l) = left {
            self.set_link(l, NEXT, right);
        }
        if let Some(r) = right {
            self.set_link(r, PREV, left);
        }
    }

    fn rebin(&mut self, frag: usize) {
        let idx = bin_of(self.size(frag));
        let head = self.bins[idx];
        self.set_word(frag, NEXT_FREE, head);
        self.set_word(frag, PREV_FREE, NIL);
        if head != NIL {
            self.set_word(head, PREV_FREE, frag);
        }
        self.bins[idx] = frag;
        self.nonempty_bin_mask |= 1 << idx;
    }

    fn unbin(&mut self, frag: usize) {
        let idx = bin_of(self.size(frag));
        let next = self.word(frag, NEXT_FREE);
        let prev = self.word(frag, PREV_FREE);
        if next != NIL {
            self.set_word(next, PREV_FREE, prev);
        }
        if prev != NIL {
            self.set_word(prev, NEXT_FREE, next);
        }
        if self.bins[idx] == frag {
            self.bins[idx] = next;
            if next == NIL {
                self.nonempty_bin_mask &= !(1 << idx);
            }
        }
    }
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &format_args!("{:#x}", self.base_address()))
            .field("diagnostics", &self.diagnostics)
            .field("nonempty_bin_mask", &format_args!("{:#b}", self.nonempty_bin_mask))
            .finish()
    }
}
