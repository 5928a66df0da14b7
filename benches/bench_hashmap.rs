use bencher::{Bencher, benchmark_group, benchmark_main};

use seg_ref_buffer::*;
use std::io::{BufRead, BufReader};
use fnv::FnvHashMap;
use memchr::memchr_iter;

mod common;

/*
Generated words are close to uniform over 26 letters,
so nearly all 2- and 3-letter prefixes show up early,
while most 5-letter ones cause allocations upon introduction into the HashMap.
*/

static BUFSIZE: usize = 64*1024;

#[inline]
fn prefix(s: &[u8], n: usize) -> &[u8] {
	&s[ .. std::cmp::min(s.len(), n) ]
}

// we're testing readers first and foremost,
// hence fnv and predetermined capacity
#[inline]
fn map(cap: usize) -> FnvHashMap<Vec<u8>, usize> {
	FnvHashMap::with_capacity_and_hasher(cap, Default::default())
}

#[inline]
fn insert(map: &mut FnvHashMap<Vec<u8>, usize>, key: &[u8]) {
	// .entry() does not accept Borrow<K>, hence this
	match map.get_mut(key) {
		Some(v) => { *v += 1; },
		None => { map.insert(key.to_vec(), 1); },
	}
}

fn bufref_hashmap(b: &mut Bencher, n: usize, cap: usize) {
	let words = common::words();
	b.iter(|| {
		let mut r = SegmentReaderBuilder::new(&words[..])
			.block_size(BUFSIZE)
			.build();
		let mut map = map(cap);
		while let Some(line) = r.read_until(b'\n').unwrap() {
			let p = line.slice(0, std::cmp::min(line.len(), n)).unwrap();
			if p.is_single_span() {
				insert(&mut map, p.first());
			} else {
				// prefix straddles two blocks
				insert(&mut map, &p.to_vec().unwrap());
			}
		}
	})
}
fn bufref_hashmap_2(b: &mut Bencher) { bufref_hashmap(b, 2, 750) }
fn bufref_hashmap_3(b: &mut Bencher) { bufref_hashmap(b, 3, 6500) }
fn bufref_hashmap_4(b: &mut Bencher) { bufref_hashmap(b, 4, 28000) }
fn bufref_hashmap_5(b: &mut Bencher) { bufref_hashmap(b, 5, 65000) }

fn std_hashmap(b: &mut Bencher, n: usize, cap: usize) {
	let words = common::words();
	b.iter(|| {
		let mut map = map(cap);
		let mut r = BufReader::with_capacity(BUFSIZE, &words[..]);
		let mut buf = vec![];
		while r.read_until(b'\n', &mut buf).unwrap() != 0 {
			// trailing delimiter is kept by std
			let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
			let p = prefix(line, n);
			insert(&mut map, p);
			buf.clear();
		}
	})
}
fn std_hashmap_2(b: &mut Bencher) { std_hashmap(b, 2, 750) }
fn std_hashmap_3(b: &mut Bencher) { std_hashmap(b, 3, 6500) }
fn std_hashmap_4(b: &mut Bencher) { std_hashmap(b, 4, 28000) }
fn std_hashmap_5(b: &mut Bencher) { std_hashmap(b, 5, 65000) }

/*
this benchmark is solely about measuring code
that populates HashMap with occasional copies of references to slices of words,
hence collection of such slices outside the bench loop
*/
fn baseline_hashmap(b: &mut Bencher, n: usize, cap: usize) {
	let data = common::words();
	let words: Vec<usize> = memchr_iter(b'\n', &data)
		.collect(); // can't clone Memchr iterator itself, hence this
	let starts = vec![0].into_iter()
		.chain(words.clone().into_iter().map(|n| n+1)); // one past delimiter
	let ends = words.into_iter()
		.chain(vec![data.len()].into_iter());
	let lines: Vec<_> = starts.zip(ends)
		.map(|(start, end)| &data[start..end])
		.collect();

	b.iter(|| {
		let mut map = map(cap);
		for &line in lines.iter() {
			let p = prefix(line, n);
			insert(&mut map, p);
		}
	})
}
fn baseline_hashmap_2(b: &mut Bencher) { baseline_hashmap(b, 2, 750) }
fn baseline_hashmap_3(b: &mut Bencher) { baseline_hashmap(b, 3, 6500) }
fn baseline_hashmap_4(b: &mut Bencher) { baseline_hashmap(b, 4, 28000) }
fn baseline_hashmap_5(b: &mut Bencher) { baseline_hashmap(b, 5, 65000) }

benchmark_group!(benches,
	bufref_hashmap_2,
	bufref_hashmap_3,
	bufref_hashmap_4,
	bufref_hashmap_5,
	std_hashmap_2,
	std_hashmap_3,
	std_hashmap_4,
	std_hashmap_5,
	baseline_hashmap_2,
	baseline_hashmap_3,
	baseline_hashmap_4,
	baseline_hashmap_5,
);
benchmark_main!(benches);
