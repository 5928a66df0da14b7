// Deterministic stand-in for a dictionary file: one word per line,
// built from lowercase letters plus the occasional b'Q'.
pub fn words() -> Vec<u8> {
	let mut out = Vec::with_capacity(2 * 1024 * 1024);
	let mut state: u32 = 0x5eed;
	let mut next = move || {
		state = state.wrapping_mul(1103515245).wrapping_add(12345);
		(state >> 16) as usize
	};
	for _ in 0..235_000 {
		let len = 2 + next() % 10;
		for _ in 0..len {
			let n = next() % 1000;
			out.push(if n == 0 { b'Q' } else { b'a' + (n % 26) as u8 });
		}
		out.push(b'\n');
	}
	out
}
