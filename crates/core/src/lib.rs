//! glas-core: the immutable value model shared by every glas runtime
//! component.
//!
//! A [`value::Value`] is a persistent binary tree with compact stem-bit
//! runs; everything else — integers, bitstrings, lists, binaries, dicts — is
//! a derived reading of that same tree, never a separate representation
//! that needs its own equality or hash rule. [`refcount::Refcount`] is the
//! one escape hatch for data this crate does not own: host/foreign buffers
//! referenced by an incref/decref pair.
//!
//! # Modules
//!
//! - `bits`: compact stem-bit word packing
//! - `value`: the `Value` tree, pairing/stem constructors, integer codec
//! - `rope`: list/binary operations over the rope-shaped encodings
//! - `dict`: the label radix trie read over `Branch`/`Stem`
//! - `shrub`: the 2-bit-per-node wire codec
//! - `glob`: the serde/bincode value interchange format
//! - `seal`: data sealing and the linearity predicate
//! - `refcount`: opaque host-owned handle lifetime management
//! - `error`: value-layer error cases

pub mod bits;
pub mod dict;
pub mod error;
pub mod glob;
pub mod refcount;
pub mod rope;
pub mod seal;
pub mod shrub;
pub mod value;

pub use bits::Stem;
pub use error::ValueError;
pub use refcount::{RefUpdate, Refcount};
pub use seal::SealKey;
pub use value::Value;
