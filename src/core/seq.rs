//! Type sequences - tuples as ordered lists of types
//!
//! Design: Every operation is a trait implemented by macro for each tuple arity:
//! - `Concat` joins two sequences
//! - `At<I>` / `SplitAt<I>` index into a sequence
//! - `Remove<I>` / `Insert<I, X>` are the primitives transforms use to
//!   rewrite a parameter list
//! - `Append<X>` grows an output tuple
//!
//! An index past the end has no impl, so misuse is a compile error rather
//! than a runtime one. Native signatures are supported up to 10 parameters.

use smallvec::SmallVec;
use std::any::{type_name, TypeId};

/// An ordered list of types
pub trait TypeSeq {
    /// Number of elements
    const LEN: usize;

    /// Element type names, in order
    fn type_names() -> SmallVec<[&'static str; 8]>;

    /// Render as `(A, B, C)`
    fn describe() -> String {
        format!("({})", Self::type_names().join(", "))
    }
}

/// Runtime identity of each element (only for `'static` element types)
pub trait SeqIds: TypeSeq + 'static {
    fn type_ids() -> SmallVec<[TypeId; 8]>;

    /// Membership test
    #[inline]
    fn contains<T: 'static>() -> bool {
        Self::index_of::<T>().is_some()
    }

    /// Position of the first element equal to `T`
    fn index_of<T: 'static>() -> Option<usize> {
        let wanted = TypeId::of::<T>();
        Self::type_ids().iter().position(|id| *id == wanted)
    }
}

/// Sequence concatenation: `(A, B) ++ (C,) = (A, B, C)`
pub trait Concat<Rhs> {
    type Output;
    fn concat(self, rhs: Rhs) -> Self::Output;
}

/// Element at index `I`
pub trait At<const I: usize> {
    type Item;
    fn at(self) -> Self::Item;
}

/// Split into `[0, I)` and `[I, LEN)`
pub trait SplitAt<const I: usize> {
    type Left;
    type Right;
    fn split(self) -> (Self::Left, Self::Right);
}

/// Take out the element at `I`, keeping the others in order
pub trait Remove<const I: usize> {
    type Item;
    type Rest;
    fn remove(self) -> (Self::Item, Self::Rest);
}

/// Put `X` at position `I`, shifting later elements right
pub trait Insert<const I: usize, X> {
    type Output;
    fn insert(self, item: X) -> Self::Output;
}

/// Push `X` at the end
pub trait Append<X> {
    type Output;
    fn append(self, item: X) -> Self::Output;
}

/// Element removed at `I`
pub type Taken<S, const I: usize> = <S as Remove<I>>::Item;

/// Sequence left after removing `I`
pub type Removed<S, const I: usize> = <S as Remove<I>>::Rest;

/// Sequence after inserting `X` at `I`
pub type Inserted<S, const I: usize, X> = <S as Insert<I, X>>::Output;

macro_rules! count_idents {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count_idents!($($tail)*) };
}

macro_rules! seq_tuple {
    ($($t:ident)*) => {
        impl<$($t,)*> TypeSeq for ($($t,)*) {
            const LEN: usize = count_idents!($($t)*);

            fn type_names() -> SmallVec<[&'static str; 8]> {
                #[allow(unused_mut)]
                let mut names = SmallVec::new();
                $(names.push(type_name::<$t>());)*
                names
            }
        }

        impl<$($t: 'static,)*> SeqIds for ($($t,)*) {
            fn type_ids() -> SmallVec<[TypeId; 8]> {
                #[allow(unused_mut)]
                let mut ids = SmallVec::new();
                $(ids.push(TypeId::of::<$t>());)*
                ids
            }
        }

        impl<$($t,)* X> Append<X> for ($($t,)*) {
            type Output = ($($t,)* X,);

            #[inline]
            #[allow(non_snake_case)]
            fn append(self, item: X) -> Self::Output {
                let ($($t,)*) = self;
                ($($t,)* item,)
            }
        }
    };
}

seq_tuple!();
seq_tuple!(T0);
seq_tuple!(T0 T1);
seq_tuple!(T0 T1 T2);
seq_tuple!(T0 T1 T2 T3);
seq_tuple!(T0 T1 T2 T3 T4);
seq_tuple!(T0 T1 T2 T3 T4 T5);
seq_tuple!(T0 T1 T2 T3 T4 T5 T6);
seq_tuple!(T0 T1 T2 T3 T4 T5 T6 T7);
seq_tuple!(T0 T1 T2 T3 T4 T5 T6 T7 T8);
seq_tuple!(T0 T1 T2 T3 T4 T5 T6 T7 T8 T9);
seq_tuple!(T0 T1 T2 T3 T4 T5 T6 T7 T8 T9 T10);
seq_tuple!(T0 T1 T2 T3 T4 T5 T6 T7 T8 T9 T10 T11);

// Index `$i` of a tuple written as `[left] $t [right]`
macro_rules! seq_index {
    ($i:literal; [$($l:ident)*] $t:ident [$($r:ident)*]) => {
        impl<$($l,)* $t, $($r,)*> At<$i> for ($($l,)* $t, $($r,)*) {
            type Item = $t;

            #[inline]
            #[allow(non_snake_case, unused_variables)]
            fn at(self) -> $t {
                let ($($l,)* $t, $($r,)*) = self;
                $t
            }
        }

        impl<$($l,)* $t, $($r,)*> SplitAt<$i> for ($($l,)* $t, $($r,)*) {
            type Left = ($($l,)*);
            type Right = ($t, $($r,)*);

            #[inline]
            #[allow(non_snake_case)]
            fn split(self) -> (Self::Left, Self::Right) {
                let ($($l,)* $t, $($r,)*) = self;
                (($($l,)*), ($t, $($r,)*))
            }
        }

        impl<$($l,)* $t, $($r,)*> Remove<$i> for ($($l,)* $t, $($r,)*) {
            type Item = $t;
            type Rest = ($($l,)* $($r,)*);

            #[inline]
            #[allow(non_snake_case)]
            fn remove(self) -> (Self::Item, Self::Rest) {
                let ($($l,)* $t, $($r,)*) = self;
                ($t, ($($l,)* $($r,)*))
            }
        }

        impl<$($l,)* $($r,)* X> Insert<$i, X> for ($($l,)* $($r,)*) {
            type Output = ($($l,)* X, $($r,)*);

            #[inline]
            #[allow(non_snake_case)]
            fn insert(self, item: X) -> Self::Output {
                let ($($l,)* $($r,)*) = self;
                ($($l,)* item, $($r,)*)
            }
        }
    };
}

// Split point at the very end: the right half is empty
macro_rules! seq_split_end {
    ($i:literal; [$($t:ident)*]) => {
        impl<$($t,)*> SplitAt<$i> for ($($t,)*) {
            type Left = ($($t,)*);
            type Right = ();

            #[inline]
            fn split(self) -> (Self::Left, Self::Right) {
                (self, ())
            }
        }
    };
}

seq_index!(0; [] T0 []);
seq_index!(0; [] T0 [T1]);
seq_index!(1; [T0] T1 []);
seq_index!(0; [] T0 [T1 T2]);
seq_index!(1; [T0] T1 [T2]);
seq_index!(2; [T0 T1] T2 []);
seq_index!(0; [] T0 [T1 T2 T3]);
seq_index!(1; [T0] T1 [T2 T3]);
seq_index!(2; [T0 T1] T2 [T3]);
seq_index!(3; [T0 T1 T2] T3 []);
seq_index!(0; [] T0 [T1 T2 T3 T4]);
seq_index!(1; [T0] T1 [T2 T3 T4]);
seq_index!(2; [T0 T1] T2 [T3 T4]);
seq_index!(3; [T0 T1 T2] T3 [T4]);
seq_index!(4; [T0 T1 T2 T3] T4 []);
seq_index!(0; [] T0 [T1 T2 T3 T4 T5]);
seq_index!(1; [T0] T1 [T2 T3 T4 T5]);
seq_index!(2; [T0 T1] T2 [T3 T4 T5]);
seq_index!(3; [T0 T1 T2] T3 [T4 T5]);
seq_index!(4; [T0 T1 T2 T3] T4 [T5]);
seq_index!(5; [T0 T1 T2 T3 T4] T5 []);
seq_index!(0; [] T0 [T1 T2 T3 T4 T5 T6]);
seq_index!(1; [T0] T1 [T2 T3 T4 T5 T6]);
seq_index!(2; [T0 T1] T2 [T3 T4 T5 T6]);
seq_index!(3; [T0 T1 T2] T3 [T4 T5 T6]);
seq_index!(4; [T0 T1 T2 T3] T4 [T5 T6]);
seq_index!(5; [T0 T1 T2 T3 T4] T5 [T6]);
seq_index!(6; [T0 T1 T2 T3 T4 T5] T6 []);
seq_index!(0; [] T0 [T1 T2 T3 T4 T5 T6 T7]);
seq_index!(1; [T0] T1 [T2 T3 T4 T5 T6 T7]);
seq_index!(2; [T0 T1] T2 [T3 T4 T5 T6 T7]);
seq_index!(3; [T0 T1 T2] T3 [T4 T5 T6 T7]);
seq_index!(4; [T0 T1 T2 T3] T4 [T5 T6 T7]);
seq_index!(5; [T0 T1 T2 T3 T4] T5 [T6 T7]);
seq_index!(6; [T0 T1 T2 T3 T4 T5] T6 [T7]);
seq_index!(7; [T0 T1 T2 T3 T4 T5 T6] T7 []);
seq_index!(0; [] T0 [T1 T2 T3 T4 T5 T6 T7 T8]);
seq_index!(1; [T0] T1 [T2 T3 T4 T5 T6 T7 T8]);
seq_index!(2; [T0 T1] T2 [T3 T4 T5 T6 T7 T8]);
seq_index!(3; [T0 T1 T2] T3 [T4 T5 T6 T7 T8]);
seq_index!(4; [T0 T1 T2 T3] T4 [T5 T6 T7 T8]);
seq_index!(5; [T0 T1 T2 T3 T4] T5 [T6 T7 T8]);
seq_index!(6; [T0 T1 T2 T3 T4 T5] T6 [T7 T8]);
seq_index!(7; [T0 T1 T2 T3 T4 T5 T6] T7 [T8]);
seq_index!(8; [T0 T1 T2 T3 T4 T5 T6 T7] T8 []);
seq_index!(0; [] T0 [T1 T2 T3 T4 T5 T6 T7 T8 T9]);
seq_index!(1; [T0] T1 [T2 T3 T4 T5 T6 T7 T8 T9]);
seq_index!(2; [T0 T1] T2 [T3 T4 T5 T6 T7 T8 T9]);
seq_index!(3; [T0 T1 T2] T3 [T4 T5 T6 T7 T8 T9]);
seq_index!(4; [T0 T1 T2 T3] T4 [T5 T6 T7 T8 T9]);
seq_index!(5; [T0 T1 T2 T3 T4] T5 [T6 T7 T8 T9]);
seq_index!(6; [T0 T1 T2 T3 T4 T5] T6 [T7 T8 T9]);
seq_index!(7; [T0 T1 T2 T3 T4 T5 T6] T7 [T8 T9]);
seq_index!(8; [T0 T1 T2 T3 T4 T5 T6 T7] T8 [T9]);
seq_index!(9; [T0 T1 T2 T3 T4 T5 T6 T7 T8] T9 []);

seq_split_end!(0; []);
seq_split_end!(1; [T0]);
seq_split_end!(2; [T0 T1]);
seq_split_end!(3; [T0 T1 T2]);
seq_split_end!(4; [T0 T1 T2 T3]);
seq_split_end!(5; [T0 T1 T2 T3 T4]);
seq_split_end!(6; [T0 T1 T2 T3 T4 T5]);
seq_split_end!(7; [T0 T1 T2 T3 T4 T5 T6]);
seq_split_end!(8; [T0 T1 T2 T3 T4 T5 T6 T7]);
seq_split_end!(9; [T0 T1 T2 T3 T4 T5 T6 T7 T8]);
seq_split_end!(10; [T0 T1 T2 T3 T4 T5 T6 T7 T8 T9]);

// Concatenation: one impl per (left arity, right arity) pair.
// The left list travels as a single token tree so it can be repeated
// against every right list.
macro_rules! seq_concat {
    (@one [$($l:ident)*] [$($r:ident)*]) => {
        impl<$($l,)* $($r,)*> Concat<($($r,)*)> for ($($l,)*) {
            type Output = ($($l,)* $($r,)*);

            #[inline]
            #[allow(non_snake_case, clippy::unused_unit)]
            fn concat(self, rhs: ($($r,)*)) -> Self::Output {
                let ($($l,)*) = self;
                let ($($r,)*) = rhs;
                ($($l,)* $($r,)*)
            }
        }
    };
    ($left:tt ;) => {};
    ($left:tt ; $right:tt $($rest:tt)*) => {
        seq_concat!(@one $left $right);
        seq_concat!($left ; $($rest)*);
    };
}

macro_rules! seq_concat_all {
    ($($left:tt)*) => {
        $(
            seq_concat!($left ;
                [] [B0] [B0 B1] [B0 B1 B2] [B0 B1 B2 B3]
                [B0 B1 B2 B3 B4] [B0 B1 B2 B3 B4 B5]);
        )*
    };
}

seq_concat_all!(
    [] [A0] [A0 A1] [A0 A1 A2] [A0 A1 A2 A3]
    [A0 A1 A2 A3 A4] [A0 A1 A2 A3 A4 A5]
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    fn same<A: 'static, B: 'static>() -> bool {
        TypeId::of::<A>() == TypeId::of::<B>()
    }

    #[test]
    fn test_len() {
        assert_eq!(<() as TypeSeq>::LEN, 0);
        assert_eq!(<(i32, f64, u8) as TypeSeq>::LEN, 3);
    }

    #[test]
    fn test_concat() {
        let joined = (1i32, 2.0f64).concat(('x', "y"));
        assert_eq!(joined, (1, 2.0, 'x', "y"));
        assert!(same::<<(i32,) as Concat<()>>::Output, (i32,)>());
        assert_eq!(().concat(()), ());
    }

    #[test]
    fn test_at_and_split() {
        assert_eq!(At::<1>::at((1u8, "two", 3.0f32)), "two");

        let (left, right) = SplitAt::<1>::split((1u8, 2u16, 3u32));
        assert_eq!(left, (1u8,));
        assert_eq!(right, (2u16, 3u32));

        let (all, rest) = SplitAt::<2>::split((1u8, 2u16));
        assert_eq!(all, (1u8, 2u16));
        assert_eq!(rest, ());
    }

    #[test]
    fn test_remove_then_insert_restores() {
        let seq = (10i32, 'a', 2.5f64);
        let (item, rest) = Remove::<1>::remove(seq);
        assert_eq!(item, 'a');
        assert_eq!(rest, (10, 2.5));
        assert_eq!(Insert::<1, char>::insert(rest, item), seq);
    }

    #[test]
    fn test_insert_into_empty_and_append() {
        assert_eq!(Insert::<0, u8>::insert((), 7), (7u8,));
        assert_eq!((1i32,).append("out"), (1i32, "out"));
        assert!(same::<<() as Append<f64>>::Output, (f64,)>());
    }

    #[test]
    fn test_membership() {
        type Params = (i32, *mut f64, bool);
        assert!(Params::contains::<*mut f64>());
        assert!(!Params::contains::<f64>());
        assert_eq!(Params::index_of::<bool>(), Some(2));
        assert_eq!(<()>::index_of::<bool>(), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(<(i32, bool) as TypeSeq>::describe(), "(i32, bool)");
        assert_eq!(<() as TypeSeq>::describe(), "()");
    }
}
