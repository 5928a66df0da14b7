/*!
Reference-counted memory blocks that back segments.

A [`Block`] is a handle: cloning it takes one more reference on the underlying
storage, dropping it gives that reference back. Once the last handle is gone
the storage is disposed of, which for pooled blocks means handing it back to
the [`BlockRecycler`] it was leased from.

```
use seg_ref_buffer::{Block, BlockPool, VecPool};

let pool = VecPool::new(4096);
let block = pool.lease();
assert_eq!(block.capacity(), 4096);

let other = block.clone();
assert_eq!(block.ref_count(), 2);
drop(other);
drop(block);

// the storage went back to the pool
assert_eq!(pool.free_blocks(), 1);
```
*/

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::trace;

mod pool;
pub use pool::*;

/// Receives block storage once nothing references it anymore.
pub trait BlockRecycler: Send + Sync {
	/// Must not panic: it runs on the drop path of the last block handle.
	fn reclaim(&self, storage: Box<[u8]>);
}

/// Source of fresh blocks for producers.
pub trait BlockPool: Send + Sync {
	/// Lease a block of at least [`block_size()`](#tymethod.block_size) bytes.
	fn lease(&self) -> Block;
	fn block_size(&self) -> usize;
}

enum Origin {
	Heap,
	Pooled(Arc<dyn BlockRecycler>),
	Static,
}

struct Inner {
	ptr: NonNull<u8>,
	capacity: usize,
	origin: Origin,
	// bytes below this mark were written and may be shared read-only
	published: AtomicUsize,
	// set while some writable segment owns the tail of this block
	writer: AtomicBool,
}

// Access to the bytes is coordinated through `published` and `writer`:
// the single writer only touches `[published, capacity)`,
// readers only touch ranges below `published`.
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Drop for Inner {
	fn drop(&mut self) {
		let raw = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.capacity);
		match &self.origin {
			Origin::Static => {},
			Origin::Heap => {
				drop(unsafe { Box::from_raw(raw) });
			},
			Origin::Pooled(recycler) => {
				trace!(capacity = self.capacity, "returning block to its pool");
				recycler.reclaim(unsafe { Box::from_raw(raw) });
			},
		}
	}
}

/// Shared reference to a fixed-capacity byte block.
#[derive(Clone)]
pub struct Block {
	inner: Arc<Inner>,
}

static EMPTY: OnceLock<Block> = OnceLock::new();

impl Block {
	fn from_storage(storage: Box<[u8]>, origin: Origin, published: usize) -> Self {
		let capacity = storage.len();
		let raw = Box::into_raw(storage) as *mut u8;
		// Box never hands out null, even for zero-sized slices
		let ptr = NonNull::new(raw).unwrap_or_else(NonNull::dangling);
		Block {
			inner: Arc::new(Inner {
				ptr, capacity, origin,
				published: AtomicUsize::new(published),
				writer: AtomicBool::new(false),
			}),
		}
	}

	/// Allocate an unpooled, zero-filled block.
	pub fn new(capacity: usize) -> Self {
		Self::from_storage(vec![0; capacity].into_boxed_slice(), Origin::Heap, 0)
	}

	/// Wrap already written bytes; the whole vector counts as published.
	pub fn from_vec(data: Vec<u8>) -> Self {
		let len = data.len();
		Self::from_storage(data.into_boxed_slice(), Origin::Heap, len)
	}

	/// Wrap storage leased from a pool; it goes back to `recycler` once the last handle drops.
	pub fn pooled(storage: Box<[u8]>, recycler: Arc<dyn BlockRecycler>) -> Self {
		Self::from_storage(storage, Origin::Pooled(recycler), 0)
	}

	/// Shared zero-capacity block.
	pub fn empty() -> Self {
		EMPTY.get_or_init(|| {
			static NOTHING: [u8; 0] = [];
			Block {
				inner: Arc::new(Inner {
					ptr: NonNull::from(&NOTHING[..]).cast(),
					capacity: 0,
					origin: Origin::Static,
					published: AtomicUsize::new(0),
					writer: AtomicBool::new(false),
				}),
			}
		}).clone()
	}

	pub fn capacity(&self) -> usize {
		self.inner.capacity
	}

	/// Number of live handles to this block.
	pub fn ref_count(&self) -> usize {
		Arc::strong_count(&self.inner)
	}

	pub fn ptr_eq(&self, other: &Block) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	pub fn is_pooled(&self) -> bool {
		matches!(self.inner.origin, Origin::Pooled(_))
	}

	pub(crate) fn published(&self) -> usize {
		self.inner.published.load(Ordering::Acquire)
	}

	pub(crate) fn publish(&self, upto: usize) {
		debug_assert!(upto <= self.capacity());
		self.inner.published.fetch_max(upto, Ordering::Release);
	}

	/// Returns `false` if another writable segment already owns this block.
	pub(crate) fn claim_writer(&self) -> bool {
		self.inner.writer
			.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
			.is_ok()
	}

	pub(crate) fn release_writer(&self) {
		self.inner.writer.store(false, Ordering::Release);
	}

	/// # Safety
	/// `start..end` must lie below the published mark,
	/// or be otherwise guaranteed not to be written concurrently.
	pub(crate) unsafe fn bytes(&self, start: usize, end: usize) -> &[u8] {
		debug_assert!(start <= end && end <= self.capacity());
		std::slice::from_raw_parts(self.inner.ptr.as_ptr().add(start), end - start)
	}

	/// # Safety
	/// Caller must be the block's only writer, and `start..end` must lie at or above the published mark.
	#[allow(clippy::mut_from_ref)]
	pub(crate) unsafe fn bytes_mut(&self, start: usize, end: usize) -> &mut [u8] {
		debug_assert!(start <= end && end <= self.capacity());
		std::slice::from_raw_parts_mut(self.inner.ptr.as_ptr().add(start), end - start)
	}
}

impl fmt::Debug for Block {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Block")
			.field("capacity", &self.capacity())
			.field("published", &self.published())
			.field("refs", &self.ref_count())
			.finish()
	}
}
