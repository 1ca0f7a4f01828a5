//! Compile-time signature machinery
//!
//! Architecture:
//! - `seq.rs` - Tuples as type sequences (concat, index, split, remove, insert)
//! - `signature.rs` - Native function and method introspection
//! - `binding.rs` - Binding types, closures and callback argument capture

pub mod binding;
pub mod seq;
pub mod signature;

pub use binding::{
    release_trampoline, Bind, BindSeq, Capture, Closure, Pointee, SlotTrampoline,
    TRAMPOLINES_PER_SIGNATURE,
};
pub use seq::{
    Append, At, Concat, Insert, Inserted, Remove, Removed, SeqIds, SplitAt, Taken, TypeSeq,
};
pub use signature::{Abi, MemberFn, NativeFn, Signature};
