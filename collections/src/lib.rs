//! Index-keyed containers shared by the planner: typed entity IDs, an
//! append-only arena, a word-sized typed bitset and the binary min-heap
//! backing the search frontier.

pub mod heap;
pub mod ref_store;
pub mod set;
