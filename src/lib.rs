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

//! ## How it works
//!
//! A [`PoolHandle`] carves a fixed-size byte region, obtained once from the
//! host allocator, into variable-sized *segments*. Carving is done by an
//! explicit placement [`Policy`]: `FirstFit` takes the earliest gap in the
//! pool big enough for the request, `BestFit` takes the smallest one. When a
//! segment is released, it coalesces with any adjacent free segment (gap) so
//! the pool's free space is always a minimal set of maximal gaps.
//!
//! ### Bookkeeping
//!
//! Three structures back every pool, kept mutually consistent across every
//! allocate/release:
//!
//! - The node arena is a growable array of segment descriptors, recycled
//!   without a per-allocation heap call; descriptors are addressed by stable
//!   index rather than raw pointer, so growing the arena never invalidates a
//!   live reference.
//! - The segment list threads those descriptors into a doubly-linked list
//!   tiling the pool from offset 0 to its total size.
//! - The gap index is a size-sorted array of the free descriptors,
//!   supporting best-fit lookup by linear scan in sorted order.
//!
//! All three grow under the same 0.75 fill-factor / 2× policy, mirroring the
//! constants in the C module this library was redesigned from.
//!
//! ### Registry
//!
//! Pools are tracked in a thread-local registry purely so [`free`] can
//! dispose every live pool at once; `allocate`/`release`/`inspect` never
//! touch it. The registry (and the library as a whole) makes no
//! thread-safety guarantee: concurrent use of the same pool or registry from
//! multiple threads without external synchronization is undefined behavior,
//! a caller obligation rather than something this crate enforces.

mod arena;
mod error;
mod gap_index;
mod pool;
mod registry;
mod segment;

pub use arena::SegmentHandle;
pub use error::{Error, Result};
pub use pool::{Policy, PoolHandle};
pub use registry::{free, init};
pub use segment::Segment;
