/*!
Segments: the nodes of a singly linked chain over pooled blocks.

A segment exposes the active range `[start, end)` of its block:

```text
| consumed | readable  | writable      |
0        start        end          capacity
```

The producer owns growth of `end` and the `next` link,
the consumer owns advancement of `start`.
*/

use crate::block::Block;
use crate::error::{BufferError, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::trace;

pub type SegmentRef = Arc<Segment>;

pub struct Segment {
	block: Block,
	start: AtomicUsize,
	end: AtomicUsize,
	next: OnceLock<SegmentRef>,
	read_only: bool,
	appending: AtomicBool,
}

impl Segment {
	/**
	Create a segment over `[start, end)` of `block`.

	A writable segment becomes the only writer of its block and must start out
	at the end of what was already written there. A read-only segment may only
	cover bytes that were already written.

	Panics if `start > end`, if the range exceeds the block,
	or if any of the write rules above is broken.
	*/
	pub fn new(block: Block, start: usize, end: usize, read_only: bool) -> SegmentRef {
		assert!(start <= end, "segment start {} is past its end {}", start, end);
		assert!(end <= block.capacity(), "segment end {} exceeds block capacity {}", end, block.capacity());
		if read_only {
			assert!(end <= block.published(), "read-only segment covers unwritten bytes");
		} else {
			assert!(end == block.published(), "writable segment must start at the published end of its block");
			assert!(block.claim_writer(), "block already has a writable segment");
		}
		Arc::new(Segment {
			block,
			start: AtomicUsize::new(start),
			end: AtomicUsize::new(end),
			next: OnceLock::new(),
			read_only,
			appending: AtomicBool::new(false),
		})
	}

	/// Writable segment at the written end of a (typically fresh) block.
	pub fn writable(block: Block) -> SegmentRef {
		let end = block.published();
		Self::new(block, end, end, false)
	}

	/// Segment over memory the caller keeps ownership of.
	///
	/// That memory may go away as soon as this returns, so `bytes[start..end]` is copied
	/// into a private block and the range is rebased onto it.
	pub fn from_unowned(bytes: &[u8], start: usize, end: usize) -> SegmentRef {
		assert!(start <= end, "segment start {} is past its end {}", start, end);
		let copy = bytes[start..end].to_vec();
		let len = copy.len();
		Self::new(Block::from_vec(copy), 0, len, true)
	}

	/// Zero-length read-only segment over the shared empty block.
	pub fn empty() -> SegmentRef {
		Self::new(Block::empty(), 0, 0, true)
	}

	pub fn start(&self) -> usize {
		self.start.load(Ordering::Acquire)
	}
	pub fn end(&self) -> usize {
		self.end.load(Ordering::Acquire)
	}
	pub fn block(&self) -> &Block {
		&self.block
	}
	pub fn is_read_only(&self) -> bool {
		self.read_only
	}
	pub fn next(&self) -> Option<&SegmentRef> {
		self.next.get()
	}

	pub fn readable_bytes(&self) -> usize {
		self.end() - self.start()
	}
	pub fn writable_bytes(&self) -> usize {
		if self.read_only {
			0
		} else {
			self.block.capacity() - self.end()
		}
	}

	/// Readable part of the segment.
	pub fn bytes(&self) -> &[u8] {
		let end = self.end();
		self.slice(self.start().min(end), end)
	}

	/// Bytes `[start, end)` of the block; `end` may not exceed the segment's end.
	pub fn slice(&self, start: usize, end: usize) -> &[u8] {
		assert!(start <= end && end <= self.end(), "range {}..{} outside of segment", start, end);
		// everything below `self.end()` is published and never written again
		unsafe { self.block.bytes(start, end) }
	}

	/// Attach the next segment; a segment is linked at most once.
	pub fn link(&self, next: SegmentRef) {
		if self.next.set(next).is_err() {
			panic!("segment is already linked");
		}
	}

	/**
	Let `f` write into the writable tail of this segment,
	then make the first `n` bytes it reports readable.
	*/
	pub fn fill_with<F, E>(&self, f: F) -> std::result::Result<usize, E>
	where F: FnOnce(&mut [u8]) -> std::result::Result<usize, E>
	{
		assert!(!self.read_only, "read-only segments cannot grow");
		let busy = self.appending.swap(true, Ordering::Acquire);
		assert!(!busy, "concurrent writes into one segment");

		let end = self.end.load(Ordering::Relaxed);
		let cap = self.block.capacity();
		// we are the claimed writer and `end` is the published mark of the block
		let dst = unsafe { self.block.bytes_mut(end, cap) };
		let res = f(dst);
		if let Ok(n) = res {
			assert!(n <= cap - end, "writer reported more bytes than it was given");
			self.block.publish(end + n);
			self.end.store(end + n, Ordering::Release);
		}
		self.appending.store(false, Ordering::Release);
		res
	}

	/// Copy as much of `src` as fits; returns the amount copied.
	pub fn append(&self, src: &[u8]) -> usize {
		let res: std::result::Result<usize, ()> = self.fill_with(|dst| {
			let n = src.len().min(dst.len());
			dst[..n].copy_from_slice(&src[..n]);
			Ok(n)
		});
		res.unwrap_or(0)
	}

	/// Mark `amount` readable bytes as consumed.
	pub fn consume(&self, amount: usize) {
		let start = self.start();
		assert!(amount <= self.end() - start, "consuming past the end of a segment");
		self.start.store(start + amount, Ordering::Release);
	}
}

impl Drop for Segment {
	fn drop(&mut self) {
		if !self.read_only {
			self.block.release_writer();
		}
		// unlink iteratively so that dropping a long chain does not recurse
		let mut next = self.next.take();
		while let Some(seg) = next {
			next = match Arc::try_unwrap(seg) {
				Ok(mut seg) => seg.next.take(),
				Err(_) => None,
			};
		}
	}
}

impl fmt::Debug for Segment {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Segment")
			.field("start", &self.start())
			.field("end", &self.end())
			.field("read_only", &self.read_only)
			.field("linked", &self.next.get().is_some())
			.finish()
	}
}

/**
Build a read-only copy of the chain covering `length` bytes from `(start_segment, start_index)`.

No bytes are copied: every new segment takes its own reference on the source block,
so the copy outlives whatever happens to the source chain afterwards.
Source parts without bytes are skipped. A zero length yields a single empty segment.

Returns the first and the last segment of the new chain.
*/
pub fn clone_range(start_segment: &SegmentRef, start_index: usize, length: usize) -> Result<(SegmentRef, SegmentRef)> {
	if length == 0 {
		let empty = Segment::empty();
		return Ok((empty.clone(), empty));
	}

	let mut first: Option<SegmentRef> = None;
	let mut last: Option<SegmentRef> = None;
	let mut remaining = length;
	let mut segment = start_segment;
	let mut index = start_index;
	let mut parts = 0;

	loop {
		let available = segment.end().saturating_sub(index);
		if available > 0 {
			let take = available.min(remaining);
			let part = Segment::new(segment.block().clone(), index, index + take, true);
			match &last {
				Some(prev) => prev.link(part.clone()),
				None => first = Some(part.clone()),
			}
			last = Some(part);
			remaining -= take;
			parts += 1;
		}
		if remaining == 0 {
			break;
		}
		segment = match segment.next() {
			Some(next) => next,
			None => return Err(BufferError::OutOfRange {
				requested: length,
				available: length - remaining,
			}),
		};
		index = segment.start();
	}

	trace!(length, parts, "cloned segment range");
	first.zip(last).ok_or(BufferError::OutOfRange { requested: length, available: 0 })
}
