use crate::block::BlockPool;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::segment::{Segment, SegmentRef};
use crate::view::BufferView;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::trace;

/**
Single-producer, single-consumer chain of segments over pooled blocks.

Data is appended at the tail, leasing blocks as needed,
and consumed from the head. Segments that fall behind the head are no longer
referenced by the chain; their blocks return to the pool as soon as no view
refers to them.

A view taken from the chain holds on to every segment after its start,
including the ones linked later. Results that are kept around for long
should be [`preserve`](struct.BufferView.html#method.preserve)d.

```
use seg_ref_buffer::{SegmentChain, VecPool};
use std::sync::Arc;

let mut chain = SegmentChain::new(Arc::new(VecPool::new(4)));
chain.write(b"hello\nworld");

let view = chain.view();
let (line, at) = view.find_byte(b'\n').unwrap().unwrap();
assert_eq!(line, b"hello");

chain.consume(&at.advance(1).unwrap()).unwrap();
assert_eq!(chain.view(), b"world");
```
*/
pub struct SegmentChain {
	pool: Arc<dyn BlockPool>,
	// first unconsumed byte
	head: Cursor,
	tail: Option<SegmentRef>,
	// unconsumed bytes in segments before the tail; those are full and never grow again
	sealed: usize,
}

impl SegmentChain {
	pub fn new(pool: Arc<dyn BlockPool>) -> Self {
		SegmentChain { pool, head: Cursor::default(), tail: None, sealed: 0 }
	}

	/**
	Make sure the tail has room for more data,
	linking a fresh empty segment if it is full.

	Returns the tail segment.
	*/
	pub fn reserve(&mut self) -> &SegmentRef {
		let full = match &self.tail {
			Some(tail) => tail.writable_bytes() == 0,
			None => true,
		};
		if full {
			let segment = Segment::writable(self.pool.lease());
			match &self.tail {
				Some(tail) => {
					let left = tail.end() - self.unconsumed_from(tail);
					self.sealed += left;
					tail.link(segment.clone());
				},
				None => self.head = Cursor::new(segment.clone(), segment.start()),
			}
			self.tail = Some(segment);
		}
		// just populated above
		self.tail.get_or_insert_with(Segment::empty)
	}

	// first unconsumed index of `tail`
	fn unconsumed_from(&self, tail: &SegmentRef) -> usize {
		if self.head.points_into(tail) {
			self.head.index()
		} else {
			tail.start()
		}
	}

	/// Append all of `data`.
	pub fn write(&mut self, mut data: &[u8]) {
		while !data.is_empty() {
			let n = self.reserve().append(data);
			data = &data[n..];
		}
	}

	/// Read once from `src` into the tail; `None` on EOF.
	pub fn fill_from<R: Read>(&mut self, src: &mut R) -> io::Result<Option<usize>> {
		let tail = self.reserve();
		match tail.fill_with(|buf| src.read(buf))? {
			0 => Ok(None),
			n => Ok(Some(n)),
		}
	}

	/// Everything written and not consumed yet.
	pub fn view(&self) -> BufferView {
		BufferView::at(&self.head, self.len())
	}

	// unconsumed data from `from` on, which the caller knows to lie `offset` bytes past the head
	pub(crate) fn view_from(&self, from: &Cursor, offset: usize) -> BufferView {
		BufferView::at(from, self.len() - offset)
	}

	pub fn len(&self) -> usize {
		match &self.tail {
			Some(tail) => self.sealed + tail.end() - self.unconsumed_from(tail),
			None => 0,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Position of the first unconsumed byte.
	pub fn head(&self) -> &Cursor {
		&self.head
	}

	/// Position right after the last written byte.
	pub fn end(&self) -> Cursor {
		match &self.tail {
			Some(tail) => Cursor::new(tail.clone(), tail.end()),
			None => Cursor::default(),
		}
	}

	/// Drop everything before `to`, which must lie between the head and the written end.
	pub fn consume(&mut self, to: &Cursor) -> Result<()> {
		// also checks that `to` is reachable and within written data
		let consumed = self.head.length_to(to)?;

		// segment `start`s stay put: views handed out earlier walk through them
		let mut left_behind = 0;
		let mut segment = self.head.segment();
		while let Some(seg) = segment {
			if to.points_into(seg) {
				break;
			}
			left_behind += 1;
			segment = seg.next();
		}

		let into_tail = match &self.tail {
			Some(tail) => to.points_into(tail),
			None => false,
		};
		self.sealed = if into_tail { 0 } else { self.sealed - consumed };
		self.head = to.clone();
		trace!(consumed, left_behind, "moved chain head");
		Ok(())
	}
}
