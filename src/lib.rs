/*!
Zero-copy views over chains of pooled memory segments.

A producer appends data into fixed-size blocks leased from a pool,
linking one [`Segment`] per block into a chain. The consumer looks at that
data through [`BufferView`]s: logical byte ranges that may span many segments,
addressed with [`Cursor`]s, which can be sliced and searched without copying,
and [`preserve`](struct.BufferView.html#method.preserve)d past the point where
the chain itself has moved on.

[`SegmentReader`] puts all of this behind a reader interface:

```
use seg_ref_buffer::SegmentReaderBuilder;

let mut r = SegmentReaderBuilder::new(&b"lorem ipsum dolor"[..])
	.block_size(4)
	.build();
let lorem = r.read_until(b' ').unwrap().unwrap();
let ipsum = r.read_until(b' ').unwrap().unwrap();
// unlike plain buffered readers, earlier results stay valid
assert_eq!(lorem, b"lorem");
assert_eq!(ipsum, b"ipsum");
```
*/

use std::io::Read;
use std::sync::Arc;

mod block;
pub use block::*;

mod segment;
pub use segment::*;

mod cursor;
pub use cursor::*;

mod walker;
pub use walker::*;

pub mod search;

mod view;
pub use view::*;

mod chain;
pub use chain::*;

mod error;
pub use error::{BufferError, Error};

pub struct SegmentReader<R> {
	src: R,
	chain: SegmentChain,
}

pub struct SegmentReaderBuilder<R> {
	src: R,
	block_size: usize,
	pool: Option<Arc<dyn BlockPool>>,
}
impl<R: Read> SegmentReaderBuilder<R> {
	pub fn new(src: R) -> Self {
		SegmentReaderBuilder {
			src,
			block_size: 8192,
			pool: None,
		}
	}

	/// Size of blocks in the private pool; ignored if a [`pool()`](#method.pool) is given.
	pub fn block_size(mut self, block_size: usize) -> Self {
		if block_size == 0 {
			panic!("zero-sized blocks requested")
		}
		self.block_size = block_size;
		self
	}

	/// Lease blocks from a shared pool instead of a private one.
	pub fn pool(mut self, pool: Arc<dyn BlockPool>) -> Self {
		self.pool = Some(pool);
		self
	}

	pub fn build(self) -> SegmentReader<R> {
		let block_size = self.block_size;
		let pool = self.pool
			.unwrap_or_else(|| Arc::new(VecPool::new(block_size)));
		SegmentReader {
			src: self.src,
			chain: SegmentChain::new(pool),
		}
	}
}

impl<R: Read> SegmentReader<R> {
	pub fn new(src: R) -> SegmentReader<R> {
		SegmentReaderBuilder::new(src)
			.build()
	}

	// returns Some(amount of data appended), or None for EOF
	fn fill(&mut self) -> Result<Option<usize>, Error> {
		Ok(self.chain.fill_from(&mut self.src)?)
	}

	// hand out `len` bytes from the head and consume them together with `skip` more
	fn take(&mut self, view: &BufferView, len: usize, skip: usize) -> Result<BufferView, Error> {
		// detached from the chain, so that a kept result pins its own blocks only
		let output = view.slice(0, len)?.preserve()?;
		let next = view.start().seek(len + skip, Some(view.len()))?;
		self.chain.consume(&next)?;
		Ok(output)
	}

	/// Returns up to `n` bytes, or `None` past EOF.
	pub fn read(&mut self, n: usize) -> Result<Option<BufferView>, Error> {
		while n > self.chain.len() {
			// fill until either:
			// - the chain holds the requested amount of data
			// - EOF is reached
			if self.fill()?.is_none() { break };
		}
		let filled = self.chain.view();
		if filled.is_empty() {
			// reading past EOF
			return Ok(None);
		}
		let len = std::cmp::min(n, filled.len());
		self.take(&filled, len, 0).map(Some)
	}

	/// Returns bytes until `delim` or EOF is reached. If no content available, returns `None`.
	pub fn read_until(&mut self, delim: u8) -> Result<Option<BufferView>, Error> {
		self.read_delimited(1, |rest| rest.find_byte(delim))
	}

	/**
	Like [`read_until()`](#method.read_until), for delimiters longer than one byte.

	Panics if `delim` is empty.
	*/
	pub fn read_until_pattern(&mut self, delim: &[u8]) -> Result<Option<BufferView>, Error> {
		if delim.is_empty() {
			panic!("empty delimiter requested")
		}
		self.read_delimited(delim.len(), |rest| rest.find_pattern(delim))
	}

	fn read_delimited<F>(&mut self, delim_len: usize, find: F) -> Result<Option<BufferView>, Error>
	where F: Fn(&BufferView) -> std::result::Result<Option<(BufferView, Cursor)>, BufferError>
	{
		// part of the filled data already known not to contain the delimiter,
		// and the position right after it
		let mut searched = 0;
		let mut resume = Cursor::default();
		loop {
			// the first fill may have only just given the chain its head
			let from = if searched == 0 { self.chain.head().clone() } else { resume };
			let rest = self.chain.view_from(&from, searched);
			if let Some((before, _)) = find(&rest)? {
				let len = searched + before.len();
				let filled = self.chain.view();
				// also silently consume delimiter
				return self.take(&filled, len, delim_len).map(Some);
			}
			// a match may start within the last `delim_len - 1` bytes
			let known = self.chain.len().saturating_sub(delim_len - 1);
			resume = if known > searched {
				let next = from.advance(known - searched)?;
				searched = known;
				next
			} else {
				from
			};
			if self.fill()?.is_none() {
				break;
			}
		}
		self.rest()
	}

	// everything left after EOF
	fn rest(&mut self) -> Result<Option<BufferView>, Error> {
		let filled = self.chain.view();
		if filled.is_empty() {
			Ok(None)
		} else {
			let len = filled.len();
			self.take(&filled, len, 0).map(Some)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// deterministic stand-in for a dictionary file
	fn words() -> Vec<u8> {
		let mut out = vec![];
		let mut state: u32 = 12345;
		for _ in 0..5000 {
			state = state.wrapping_mul(1103515245).wrapping_add(12345);
			let len = 1 + (state >> 16) as usize % 12;
			for _ in 0..len {
				state = state.wrapping_mul(1103515245).wrapping_add(12345);
				let c = b"abcdefghijklmnopqrstuvwxyzQ"[(state >> 16) as usize % 27];
				out.push(c);
			}
			out.push(b'\n');
		}
		out
	}

	#[test]
	fn read_until() {
		let mut r = SegmentReaderBuilder::new(&b"lorem ipsum dolor sit amet"[..])
			.block_size(4)
			.build();
		assert_eq!(r.read_until(b' ').unwrap().unwrap(), b"lorem");
		assert_eq!(r.read_until(b' ').unwrap().unwrap(), b"ipsum");
		assert_eq!(r.read_until(b' ').unwrap().unwrap(), b"dolor");
		assert_eq!(r.read_until(b' ').unwrap().unwrap(), b"sit");
		assert_eq!(r.read_until(b' ').unwrap().unwrap(), b"amet");
		assert!(r.read_until(b' ').unwrap().is_none());
		assert!(r.read_until(b' ').unwrap().is_none());
	}

	#[test]
	fn read_until_words() {
		let words = words();
		let mut r = SegmentReaderBuilder::new(&words[..])
			.block_size(4)
			.build();
		let mut expected = words.split(|&c| c == b'\n');
		while let Some(line) = r.read_until(b'\n').unwrap() {
			assert_eq!(line, expected.next().unwrap());
		}

		// reader: returned immediately after hitting EOF past last b'\n'
		// words: this is .split(), hence empty string past last b'\n'
		assert_eq!(expected.next(), Some(&b""[..]));

		assert_eq!(expected.next(), None);
	}

	// like read_until_words, but splits by b'Q', so that chunks span many blocks
	// also uses slightly bigger blocks
	#[test]
	fn read_until_words_long() {
		let words = words();
		let mut r = SegmentReaderBuilder::new(&words[..])
			.block_size(32)
			.build();
		let mut expected = words.split(|&c| c == b'Q');
		while let Some(chunk) = r.read_until(b'Q').unwrap() {
			assert_eq!(chunk, expected.next().unwrap());
		}

		assert_eq!(expected.next(), None);
	}

	#[test]
	fn read_until_pattern() {
		let mut r = SegmentReaderBuilder::new(&b"GET /x\r\nHost: y\r\n\r\nbody"[..])
			.block_size(3)
			.build();
		assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"GET /x");
		assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"Host: y");
		assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"");
		assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"body");
		assert!(r.read_until_pattern(b"\r\n").unwrap().is_none());
	}

	#[test]
	fn read_until_pattern_any_block_size() {
		for block_size in 1..8 {
			let mut r = SegmentReaderBuilder::new(&b"ab\r\ncd\r\n\r\nef\r"[..])
				.block_size(block_size)
				.build();
			assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"ab");
			assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"cd");
			assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"");
			assert_eq!(r.read_until_pattern(b"\r\n").unwrap().unwrap(), b"ef\r");
			assert!(r.read_until_pattern(b"\r\n").unwrap().is_none());
		}
	}

	#[test]
	#[should_panic]
	fn read_until_empty_pattern() {
		let mut r = SegmentReader::new(&b"abc"[..]);
		let _ = r.read_until_pattern(b"");
	}

	#[test]
	fn long_line_over_tiny_blocks() {
		let mut input = vec![b'x'; 100_000];
		input.extend_from_slice(b"\ntail");
		let mut r = SegmentReaderBuilder::new(&input[..])
			.block_size(16)
			.build();
		let line = r.read_until(b'\n').unwrap().unwrap();
		assert_eq!(line.len(), 100_000);
		assert!(line.equals(&input[..100_000]));
		assert_eq!(r.read_until(b'\n').unwrap().unwrap(), b"tail");
		assert!(r.read_until(b'\n').unwrap().is_none());
	}

	#[test]
	fn kept_results_pin_only_their_blocks() {
		let mut input = vec![];
		for i in 0..10_000 {
			input.extend_from_slice(format!("line{}\n", i).as_bytes());
		}
		let pool = VecPool::new(64);
		let mut r = SegmentReaderBuilder::new(&input[..])
			.pool(Arc::new(pool.clone()))
			.build();
		let first = r.read_until(b'\n').unwrap().unwrap();
		let mut lines = 1;
		while r.read_until(b'\n').unwrap().is_some() {
			lines += 1;
		}
		assert_eq!(lines, 10_000);
		assert_eq!(first, b"line0");
		// the kept line's block, plus the reader's own tail
		assert!(pool.outstanding() <= 3, "{} blocks outstanding", pool.outstanding());
		drop(r);
		assert_eq!(pool.outstanding(), 1);
		drop(first);
		assert_eq!(pool.outstanding(), 0);
	}

	#[test]
	fn read() {
		let mut r = SegmentReaderBuilder::new(&b"lorem ipsum dolor sit amet"[..])
			.block_size(4)
			.build();
		assert_eq!(r.read(5).unwrap().unwrap(), b"lorem");
		assert_eq!(r.read(6).unwrap().unwrap(), b" ipsum");
		assert_eq!(r.read(1024).unwrap().unwrap(), b" dolor sit amet");
		assert!(r.read(1).unwrap().is_none());
	}

	fn read_words(block_size: usize, read: usize) {
		let words = words();
		let mut r = SegmentReaderBuilder::new(&words[..])
			.block_size(block_size)
			.build();
		let mut expected = words.chunks(read);
		while let Some(chunk) = r.read(read).unwrap() {
			assert_eq!(chunk, expected.next().unwrap());
		}
		assert_eq!(expected.next(), None);
	}

	#[test]
	fn read_words_4x3() {
		read_words(4, 3)
	}

	#[test]
	fn read_words_4x5() {
		read_words(4, 5)
	}

	#[test]
	fn results_outlive_reads() {
		let pool = VecPool::new(4);
		let mut r = SegmentReaderBuilder::new(&b"one two three"[..])
			.pool(Arc::new(pool.clone()))
			.build();
		let one = r.read_until(b' ').unwrap().unwrap();
		let two = r.read_until(b' ').unwrap().unwrap();
		let three = r.read_until(b' ').unwrap().unwrap();
		assert_eq!((one.clone(), two, three), (BufferView::copied(b"one"), BufferView::copied(b"two"), BufferView::copied(b"three")));
		drop(r);
		assert!(pool.outstanding() > 0);
		assert_eq!(one, b"one");
	}

	#[test]
	#[should_panic]
	fn zero_block_size() {
		SegmentReaderBuilder::new(&b""[..]).block_size(0);
	}
}
