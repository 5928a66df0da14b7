use crate::error::{BufferError, Result};
use crate::segment::SegmentRef;
use crate::walker::{Chunk, SegmentWalker};
use std::fmt;
use std::sync::Arc;

/**
Logical position in a segment chain: a segment and an index into its block.

Cursors are not normalized: the end of one segment and the start of the next
are the same logical position but different cursors. Equality compares segment
identity and index.

A cursor keeps its segment alive, but it is only meaningful while that segment
is still reachable from the chain it was taken from.
*/
#[derive(Clone, Default)]
pub struct Cursor {
	segment: Option<SegmentRef>,
	index: usize,
}

impl Cursor {
	pub fn new(segment: SegmentRef, index: usize) -> Self {
		debug_assert!(segment.start() <= index, "cursor before the start of its segment");
		Cursor { segment: Some(segment), index }
	}

	pub fn segment(&self) -> Option<&SegmentRef> {
		self.segment.as_ref()
	}

	pub fn index(&self) -> usize {
		self.index
	}

	pub fn is_default(&self) -> bool {
		self.segment.is_none()
	}

	pub(crate) fn points_into(&self, segment: &SegmentRef) -> bool {
		match &self.segment {
			Some(own) => Arc::ptr_eq(own, segment),
			None => false,
		}
	}

	/// True if no readable byte follows this position.
	/// Segments without readable bytes further down the chain do not count.
	pub fn is_end(&self) -> bool {
		let segment = match &self.segment {
			Some(segment) => segment,
			None => return true,
		};
		// `next` is loaded before `end`: the producer grows `end` before linking,
		// so bytes appended in between are never skipped
		let mut next = segment.next();
		if self.index < segment.end() {
			return false;
		}
		while let Some(seg) = next {
			next = seg.next();
			if seg.readable_bytes() > 0 {
				return false;
			}
		}
		true
	}

	/**
	Position `bytes` further down the chain.

	With `bound`, the walk is limited to that many bytes and they must exist.
	Without it, the walk goes on until the chain ends, and landing exactly on
	the end of the data is fine.
	*/
	pub fn seek(&self, bytes: usize, bound: Option<usize>) -> Result<Cursor> {
		let segment = match &self.segment {
			Some(segment) => segment,
			None if bytes == 0 => return Ok(Cursor::default()),
			None => return Err(BufferError::OutOfRange { requested: bytes, available: 0 }),
		};

		let following = segment.end().saturating_sub(self.index);
		if bytes <= following {
			return Ok(Cursor::new(segment.clone(), self.index + bytes));
		}
		if let Some(bound) = bound {
			if bytes > bound {
				return Err(BufferError::OutOfRange { requested: bytes, available: bound });
			}
		}

		let mut remaining = bytes;
		let mut walked = 0;
		let mut walker = SegmentWalker::from_parts(Some(segment.clone()), self.index, bound);
		while let Some(chunk) = walker.advance()? {
			if chunk.len() >= remaining {
				let index = chunk.start() + remaining;
				return Ok(Cursor::new(chunk.segment().clone(), index));
			}
			remaining -= chunk.len();
			walked += chunk.len();
		}
		Err(BufferError::OutOfRange { requested: bytes, available: walked })
	}

	/// Same as [`seek()`](#method.seek) without a bound.
	pub fn advance(&self, count: usize) -> Result<Cursor> {
		self.seek(count, None)
	}

	/// Number of bytes from here to `other`, which must lie further down the chain.
	pub fn length_to(&self, other: &Cursor) -> Result<usize> {
		let (segment, target) = match (&self.segment, &other.segment) {
			(None, None) => return Ok(0),
			(Some(segment), Some(target)) => (segment, target),
			_ => return Err(BufferError::Unreachable),
		};
		let target_end = target.end();
		if other.index > target_end {
			return Err(BufferError::CursorPastEnd { index: other.index, end: target_end });
		}

		let mut length = 0;
		let mut segment = segment;
		let mut index = self.index;
		loop {
			if Arc::ptr_eq(segment, target) {
				if other.index < index {
					return Err(BufferError::Unreachable);
				}
				return Ok(length + other.index - index);
			}
			length += segment.end().saturating_sub(index);
			segment = segment.next().ok_or(BufferError::Unreachable)?;
			index = segment.start();
		}
	}

	/// True if `other` lies at or after this position in the same chain.
	pub fn is_reachable(&self, other: &Cursor) -> bool {
		let (mut segment, target) = match (&self.segment, &other.segment) {
			(None, None) => return true,
			(Some(segment), Some(target)) => (segment, target),
			_ => return false,
		};
		if Arc::ptr_eq(segment, target) {
			return self.index <= other.index;
		}
		while let Some(next) = segment.next() {
			if Arc::ptr_eq(next, target) {
				return true;
			}
			segment = next;
		}
		false
	}

	/// True if at least `length` readable bytes follow this position.
	pub fn has_at_least(&self, length: usize) -> bool {
		let mut segment = match &self.segment {
			Some(segment) => segment,
			None => return length == 0,
		};
		let mut next = segment.next();
		let mut found = segment.end().saturating_sub(self.index);
		while found < length {
			segment = match next {
				Some(seg) => seg,
				None => return false,
			};
			next = segment.next();
			found += segment.readable_bytes();
		}
		true
	}

	/**
	The contiguous bytes from here up to `end`, or up to the end of the segment
	if `end` lies further away, together with the position right after them.

	Segments without readable bytes are stepped over, so a freshly linked,
	still empty tail is not mistaken for the end of the data.
	Returns `None` if there is nothing between the two positions.
	A default `end` stands for the end of the chain.
	*/
	pub fn try_get_span(&self, end: &Cursor) -> Option<(Chunk, Cursor)> {
		let mut segment = self.segment.clone()?;
		let mut index = self.index;
		loop {
			let last = end.points_into(&segment);
			// see is_end() on why `next` goes first
			let next = segment.next().cloned();
			let stop = if last { end.index } else { segment.end() };
			if stop > index {
				let chunk = Chunk::new(segment.clone(), index, stop);
				return Some((chunk, Cursor::new(segment, stop)));
			}
			if last {
				return None;
			}
			segment = next?;
			index = segment.start();
		}
	}

	/// Chunks from here to the end of the chain.
	pub fn walk(&self) -> SegmentWalker {
		SegmentWalker::from_parts(self.segment.clone(), self.index, None)
	}
}

impl PartialEq for Cursor {
	fn eq(&self, other: &Cursor) -> bool {
		match (&self.segment, &other.segment) {
			(None, None) => true,
			(Some(a), Some(b)) => Arc::ptr_eq(a, b) && self.index == other.index,
			_ => false,
		}
	}
}
impl Eq for Cursor {}

impl fmt::Debug for Cursor {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.segment {
			None => write!(f, "Cursor(default)"),
			Some(segment) => write!(f, "Cursor({:p}@{})", Arc::as_ptr(segment), self.index),
		}
	}
}
