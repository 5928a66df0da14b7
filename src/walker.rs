use crate::error::{BufferError, Result};
use crate::segment::SegmentRef;
use std::fmt;

/// Contiguous sub-range `[start, end)` of one segment.
#[derive(Clone)]
pub struct Chunk {
	segment: SegmentRef,
	start: usize,
	end: usize,
}

impl Chunk {
	pub(crate) fn new(segment: SegmentRef, start: usize, end: usize) -> Self {
		debug_assert!(start <= end);
		Chunk { segment, start, end }
	}
	pub fn segment(&self) -> &SegmentRef {
		&self.segment
	}
	pub fn start(&self) -> usize {
		self.start
	}
	pub fn end(&self) -> usize {
		self.end
	}
	pub fn len(&self) -> usize {
		self.end - self.start
	}
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}
	pub fn bytes(&self) -> &[u8] {
		self.segment.slice(self.start, self.end)
	}
}

impl fmt::Debug for Chunk {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Chunk")
			.field("start", &self.start)
			.field("end", &self.end)
			.finish()
	}
}

/**
Walks a segment chain, yielding the chunks that cover a number of bytes.

A bounded walker promises that its bytes are materialized:
running out of segments before covering them is an error.
An unbounded walker simply stops at the end of the chain.

Chunks may be empty: segments without readable bytes are yielded as they are met.
*/
#[derive(Clone)]
pub struct SegmentWalker {
	segment: Option<SegmentRef>,
	index: usize,
	// None stands for "walk until the chain ends"
	remaining: Option<usize>,
}

impl SegmentWalker {
	pub fn new(segment: SegmentRef, index: usize, length: usize) -> Self {
		SegmentWalker { segment: Some(segment), index, remaining: Some(length) }
	}

	pub fn unbounded(segment: SegmentRef, index: usize) -> Self {
		SegmentWalker { segment: Some(segment), index, remaining: None }
	}

	pub(crate) fn from_parts(segment: Option<SegmentRef>, index: usize, remaining: Option<usize>) -> Self {
		SegmentWalker { segment, index, remaining }
	}

	/// Bytes still to be walked, `None` for an unbounded walker.
	pub fn remaining(&self) -> Option<usize> {
		self.remaining
	}

	pub fn advance(&mut self) -> Result<Option<Chunk>> {
		let segment = match self.segment.take() {
			Some(segment) => segment,
			None => return Ok(None),
		};

		// linked only after `end` stopped growing
		let next = segment.next().cloned();
		let seg_end = segment.end().max(self.index);
		let end = match self.remaining {
			Some(remaining) => seg_end.min(self.index + remaining),
			None => seg_end,
		};
		let chunk = Chunk::new(segment.clone(), self.index, end);

		if let Some(remaining) = self.remaining {
			if chunk.len() == remaining {
				self.remaining = Some(0);
				return Ok(Some(chunk));
			}
		}

		match next {
			None => {
				if let Some(remaining) = self.remaining {
					return Err(BufferError::EndNotReached { remaining: remaining - chunk.len() });
				}
			},
			Some(next) => {
				if let Some(remaining) = &mut self.remaining {
					*remaining -= chunk.len();
				}
				self.index = next.start();
				self.segment = Some(next);
			},
		}
		Ok(Some(chunk))
	}
}

impl Iterator for SegmentWalker {
	type Item = Result<Chunk>;

	fn next(&mut self) -> Option<Result<Chunk>> {
		self.advance().transpose()
	}
}
