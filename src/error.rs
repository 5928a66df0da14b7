use quick_error::quick_error;
use std::io;

quick_error! {
	/// Bounds faults raised by cursors, walkers and views.
	///
	/// All of them mean that a caller asked for bytes that are not materialized
	/// in the segment chain; none of them are worth retrying.
	#[derive(Debug, Clone, PartialEq, Eq)]
	pub enum BufferError {
		OutOfRange { requested: usize, available: usize } {
			display("requested {} bytes, but only {} are available", requested, available)
		}
		/// Segments ended while a fixed number of bytes was still expected
		EndNotReached { remaining: usize } {
			display("segment chain ended {} bytes short of a fixed end", remaining)
		}
		Unreachable {
			display("cursor is not reachable from this position")
		}
		CursorPastEnd { index: usize, end: usize } {
			display("cursor index {} is past its segment end {}", index, end)
		}
		DestinationTooSmall { needed: usize, available: usize } {
			display("destination holds {} bytes, {} needed", available, needed)
		}
	}
}

quick_error! {
	#[derive(Debug)]
	pub enum Error {
		Io(err: io::Error) {
			from()
			display("I/O error: {}", err)
			cause(err)
		}
		Buffer(err: BufferError) {
			from()
			display("buffer error: {}", err)
			cause(err)
		}
	}
}

pub type Result<T> = std::result::Result<T, BufferError>;
