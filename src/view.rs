/*!
Read-only views over a range of a segment chain.

A [`BufferView`] names `length` bytes starting at a position in a chain,
however many segments they happen to span. Views never copy on their own:
slicing and searching produce more views over the same segments,
and only [`copy_to()`](struct.BufferView.html#method.copy_to) and
[`to_vec()`](struct.BufferView.html#method.to_vec) flatten data.

```
use seg_ref_buffer::BufferView;

let view = BufferView::from_chunks(vec![&b"GET /x"[..], b"\r", b"\nrest"]);
let (line, after) = view.find_pattern(b"\r\n").unwrap().unwrap();
assert_eq!(line, b"GET /x");
assert_eq!(view.slice_from_cursor(&after).unwrap(), b"rest");
```
*/

use crate::block::Block;
use crate::cursor::Cursor;
use crate::error::{BufferError, Result};
use crate::search;
use crate::segment::{self, Segment, SegmentRef};
use crate::walker::SegmentWalker;
use std::fmt;
use std::io;

#[derive(Clone)]
pub struct BufferView {
	segment: SegmentRef,
	index: usize,
	length: usize,
}

impl BufferView {
	/// View over `length` bytes from `(segment, index)`; the bytes must already be in the chain.
	pub fn new(segment: SegmentRef, index: usize, length: usize) -> Result<Self> {
		let start = Cursor::new(segment.clone(), index);
		if !start.has_at_least(length) {
			let available = start.walk()
				.filter_map(|c| c.ok())
				.map(|c| c.len())
				.sum();
			return Err(BufferError::OutOfRange { requested: length, available });
		}
		Ok(BufferView { segment, index, length })
	}

	/// View over everything between two cursors of one chain.
	pub fn from_cursors(start: &Cursor, end: &Cursor) -> Result<Self> {
		let length = start.length_to(end)?;
		Ok(Self::at(start, length))
	}

	pub fn empty() -> Self {
		BufferView { segment: Segment::empty(), index: 0, length: 0 }
	}

	/// Copy memory the caller keeps ownership of into a view of its own.
	pub fn copied(bytes: &[u8]) -> Self {
		let segment = Segment::from_unowned(bytes, 0, bytes.len());
		BufferView { segment, index: 0, length: bytes.len() }
	}

	/**
	Build a chain with one segment per chunk and view all of it.

	Empty chunks become segments without readable bytes,
	which makes this handy for exercising segment boundaries.
	*/
	pub fn from_chunks<'a, I>(chunks: I) -> Self
	where I: IntoIterator<Item = &'a [u8]>
	{
		let mut head: Option<SegmentRef> = None;
		let mut tail: Option<SegmentRef> = None;
		let mut length = 0;
		for chunk in chunks {
			let segment = Segment::from_unowned(chunk, 0, chunk.len());
			length += chunk.len();
			match &tail {
				Some(prev) => prev.link(segment.clone()),
				None => head = Some(segment.clone()),
			}
			tail = Some(segment);
		}
		match head {
			Some(segment) => BufferView { segment, index: 0, length },
			None => Self::empty(),
		}
	}

	// `length` must already be known to be reachable from `start`
	pub(crate) fn at(start: &Cursor, length: usize) -> Self {
		match start.segment() {
			Some(segment) => BufferView { segment: segment.clone(), index: start.index(), length },
			None => Self::empty(),
		}
	}

	pub fn len(&self) -> usize {
		self.length
	}

	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	pub fn start(&self) -> Cursor {
		Cursor::new(self.segment.clone(), self.index)
	}

	/// Position right after the last byte of the view.
	pub fn end(&self) -> Result<Cursor> {
		self.start().seek(self.length, Some(self.length))
	}

	/// Contiguous pieces of the view, in order.
	pub fn chunks(&self) -> SegmentWalker {
		SegmentWalker::new(self.segment.clone(), self.index, self.length)
	}

	/// True if the whole view lies within its first segment.
	pub fn is_single_span(&self) -> bool {
		self.segment.end().saturating_sub(self.index) >= self.length
	}

	/// First non-empty contiguous piece of the view; empty for an empty view.
	pub fn first(&self) -> &[u8] {
		if self.length == 0 {
			return &[];
		}
		let mut segment = &self.segment;
		let mut index = self.index;
		loop {
			let end = segment.end();
			if end > index {
				return segment.slice(index, end.min(index + self.length));
			}
			segment = match segment.next() {
				Some(next) => next,
				None => return &[],
			};
			index = segment.start();
		}
	}

	fn out_of_range(&self, requested: usize) -> BufferError {
		BufferError::OutOfRange { requested, available: self.length }
	}

	// distance from the start of the view to `cursor`, which must lie within the view
	fn offset_of(&self, cursor: &Cursor) -> Result<usize> {
		let offset = self.start().length_to(cursor)?;
		if offset > self.length {
			return Err(self.out_of_range(offset));
		}
		Ok(offset)
	}

	/// `length` bytes starting `start` bytes into the view.
	pub fn slice(&self, start: usize, length: usize) -> Result<Self> {
		let end = start.checked_add(length)
			.ok_or_else(|| self.out_of_range(usize::MAX))?;
		if end > self.length {
			return Err(self.out_of_range(end));
		}
		if start == 0 {
			return Ok(BufferView { segment: self.segment.clone(), index: self.index, length });
		}
		let cursor = self.start().seek(start, Some(self.length))?;
		Ok(Self::at(&cursor, length))
	}

	/// Everything from `start` bytes into the view.
	pub fn slice_from(&self, start: usize) -> Result<Self> {
		let length = self.length.checked_sub(start)
			.ok_or_else(|| self.out_of_range(start))?;
		self.slice(start, length)
	}

	/// Everything from `start` bytes into the view up to `end`.
	pub fn slice_to_cursor(&self, start: usize, end: &Cursor) -> Result<Self> {
		if start > self.length {
			return Err(self.out_of_range(start));
		}
		let cursor = self.start().seek(start, Some(self.length))?;
		let length = cursor.length_to(end)?;
		if start + length > self.length {
			return Err(self.out_of_range(start + length));
		}
		Ok(Self::at(&cursor, length))
	}

	/// Everything between two cursors inside the view.
	pub fn slice_between(&self, start: &Cursor, end: &Cursor) -> Result<Self> {
		let offset = self.offset_of(start)?;
		let length = start.length_to(end)?;
		if offset + length > self.length {
			return Err(self.out_of_range(offset + length));
		}
		Ok(Self::at(start, length))
	}

	/// Everything from a cursor inside the view.
	pub fn slice_from_cursor(&self, start: &Cursor) -> Result<Self> {
		let offset = self.offset_of(start)?;
		Ok(Self::at(start, self.length - offset))
	}

	/**
	Find the first occurrence of `byte`.

	Returns the view up to (not including) that byte,
	and a cursor pointing at it.
	*/
	pub fn find_byte(&self, byte: u8) -> Result<Option<(BufferView, Cursor)>> {
		let mut offset = 0;
		for chunk in self.chunks() {
			let chunk = chunk?;
			if let Some(pos) = search::find_byte(byte, chunk.bytes()) {
				let cursor = Cursor::new(chunk.segment().clone(), chunk.start() + pos);
				let before = BufferView { segment: self.segment.clone(), index: self.index, length: offset + pos };
				return Ok(Some((before, cursor)));
			}
			offset += chunk.len();
		}
		Ok(None)
	}

	/// Find a two byte delimiter, see [`find_pattern()`](#method.find_pattern).
	pub fn find_2(&self, first: u8, second: u8) -> Result<Option<(BufferView, Cursor)>> {
		self.find_pattern(&[first, second])
	}

	/**
	Find the first occurrence of `pattern`.

	Returns the view up to the start of the match,
	and a cursor pointing right after it.

	Candidates are located with [`find_byte()`](#method.find_byte) on the first byte of the pattern
	and checked one by one, so this is meant for short delimiters.
	*/
	pub fn find_pattern(&self, pattern: &[u8]) -> Result<Option<(BufferView, Cursor)>> {
		let first = match pattern.first() {
			Some(&first) => first,
			None => return Ok(Some((self.slice(0, 0)?, self.start()))),
		};

		let mut rest = self.clone();
		let mut consumed = 0;
		loop {
			let (before, at) = match rest.find_byte(first)? {
				Some(found) => found,
				None => return Ok(None),
			};
			let offset = consumed + before.len();
			let candidate = Self::at(&at, rest.length - before.len());
			if candidate.starts_with(pattern) {
				let end = at.seek(pattern.len(), Some(candidate.length))?;
				return Ok(Some((self.slice(0, offset)?, end)));
			}
			rest = candidate.slice_from(1)?;
			consumed = offset + 1;
		}
	}

	pub fn starts_with(&self, prefix: &[u8]) -> bool {
		if prefix.len() > self.length {
			return false;
		}
		if self.is_single_span() {
			return self.segment.slice(self.index, self.index + prefix.len()) == prefix;
		}
		let mut rest = prefix;
		for chunk in SegmentWalker::new(self.segment.clone(), self.index, prefix.len()) {
			let chunk = match chunk {
				Ok(chunk) => chunk,
				Err(_) => return false,
			};
			let bytes = chunk.bytes();
			if &rest[..bytes.len()] != bytes {
				return false;
			}
			rest = &rest[bytes.len()..];
		}
		rest.is_empty()
	}

	pub fn equals(&self, other: &[u8]) -> bool {
		self.length == other.len() && self.starts_with(other)
	}

	/// Copy the view into the beginning of `dest`.
	pub fn copy_to(&self, dest: &mut [u8]) -> Result<()> {
		if dest.len() < self.length {
			return Err(BufferError::DestinationTooSmall { needed: self.length, available: dest.len() });
		}
		let mut at = 0;
		for chunk in self.chunks() {
			let chunk = chunk?;
			dest[at..at + chunk.len()].copy_from_slice(chunk.bytes());
			at += chunk.len();
		}
		Ok(())
	}

	pub fn to_vec(&self) -> Result<Vec<u8>> {
		let mut out = Vec::with_capacity(self.length);
		for chunk in self.chunks() {
			out.extend_from_slice(chunk?.bytes());
		}
		Ok(out)
	}

	/**
	Copy of this view that no longer depends on the source chain.

	The copy is made of fresh read-only segments that hold their own references
	to the same blocks, so the producer may go on appending and the consumer may
	release the source segments while the copy stays readable.
	*/
	pub fn preserve(&self) -> Result<Self> {
		let (first, _) = segment::clone_range(&self.segment, self.index, self.length)?;
		let index = first.start();
		Ok(BufferView { segment: first, index, length: self.length })
	}

	/// `std::io::Read` over the bytes of the view.
	pub fn reader(&self) -> Result<ViewReader> {
		Ok(ViewReader { position: self.start(), end: self.end()? })
	}
}

impl From<Vec<u8>> for BufferView {
	fn from(data: Vec<u8>) -> Self {
		let length = data.len();
		let segment = Segment::new(Block::from_vec(data), 0, length, true);
		BufferView { segment, index: 0, length }
	}
}

impl Default for BufferView {
	fn default() -> Self {
		Self::empty()
	}
}

impl PartialEq for BufferView {
	fn eq(&self, other: &BufferView) -> bool {
		if self.length != other.length {
			return false;
		}
		let mut offset = 0;
		for chunk in other.chunks() {
			let chunk = match chunk {
				Ok(chunk) => chunk,
				Err(_) => return false,
			};
			let matches = self.slice_from(offset)
				.map(|rest| rest.starts_with(chunk.bytes()))
				.unwrap_or(false);
			if !matches {
				return false;
			}
			offset += chunk.len();
		}
		true
	}
}
impl Eq for BufferView {}

impl PartialEq<[u8]> for BufferView {
	fn eq(&self, other: &[u8]) -> bool {
		self.equals(other)
	}
}
impl<'a> PartialEq<&'a [u8]> for BufferView {
	fn eq(&self, other: &&'a [u8]) -> bool {
		self.equals(other)
	}
}
impl<'a, const N: usize> PartialEq<&'a [u8; N]> for BufferView {
	fn eq(&self, other: &&'a [u8; N]) -> bool {
		self.equals(&other[..])
	}
}

impl fmt::Debug for BufferView {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "BufferView(b\"")?;
		for chunk in self.chunks() {
			let chunk = match chunk {
				Ok(chunk) => chunk,
				Err(_) => return write!(f, "\" <truncated>)"),
			};
			for &b in chunk.bytes() {
				for c in std::ascii::escape_default(b) {
					write!(f, "{}", c as char)?;
				}
			}
		}
		write!(f, "\")")
	}
}

/// Reads the bytes of a [`BufferView`] one contiguous piece at a time.
pub struct ViewReader {
	position: Cursor,
	end: Cursor,
}

impl ViewReader {
	/// Current position within the chain.
	pub fn position(&self) -> &Cursor {
		&self.position
	}
}

impl io::Read for ViewReader {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let chunk = match self.position.try_get_span(&self.end) {
			Some((chunk, _)) => chunk,
			None => return Ok(0),
		};
		let n = chunk.len().min(buf.len());
		buf[..n].copy_from_slice(&chunk.bytes()[..n]);
		self.position = Cursor::new(chunk.segment().clone(), chunk.start() + n);
		Ok(n)
	}
}
