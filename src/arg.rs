//! Runtime type enforcement for keys and values.
//!
//! Operations are generic over [`StrArg`] so that loosely typed call sites
//! (generic code, values lifted out of deserialized data) get the same
//! contract a dynamically typed mapping would give them: only strings are
//! accepted, everything else is a `WrongType` error raised before the map
//! is touched. Byte sequences are rejected even when they hold valid UTF-8.

use crate::error::{ArgRole, Error, Result};
use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;

/// An argument that may or may not be a string.
pub trait StrArg {
    /// Name of the argument's type as reported in `WrongType` errors.
    fn type_name(&self) -> &'static str;

    /// The string content, or `None` when the argument is not a string.
    fn as_str_arg(&self) -> Option<&str>;
}

#[inline]
pub(crate) fn check<'a, A: StrArg + ?Sized>(arg: &'a A, role: ArgRole) -> Result<&'a str> {
    arg.as_str_arg()
        .ok_or_else(|| Error::wrong_type(role, arg.type_name()))
}

macro_rules! impl_str {
    ($($t:ty),* $(,)?) => {$(
        impl StrArg for $t {
            #[inline]
            fn type_name(&self) -> &'static str { "string" }
            #[inline]
            fn as_str_arg(&self) -> Option<&str> { Some(AsRef::<str>::as_ref(self)) }
        }
    )*};
}

macro_rules! impl_rejected {
    ($name:literal => $($t:ty),* $(,)?) => {$(
        impl StrArg for $t {
            #[inline]
            fn type_name(&self) -> &'static str { $name }
            #[inline]
            fn as_str_arg(&self) -> Option<&str> { None }
        }
    )*};
}

impl_str!(str, String, Box<str>, Rc<str>, Arc<str>);

impl StrArg for Cow<'_, str> {
    fn type_name(&self) -> &'static str {
        "string"
    }
    fn as_str_arg(&self) -> Option<&str> {
        Some(&**self)
    }
}

impl_rejected!("bytes" => [u8], Vec<u8>, Box<[u8]>);
impl_rejected!("integer" => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_rejected!("float" => f32, f64);
impl_rejected!("bool" => bool);
impl_rejected!("char" => char);
impl_rejected!("unit" => ());

impl<const N: usize> StrArg for [u8; N] {
    fn type_name(&self) -> &'static str {
        "bytes"
    }
    fn as_str_arg(&self) -> Option<&str> {
        None
    }
}

impl<T: StrArg + ?Sized> StrArg for &T {
    #[inline]
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }
    #[inline]
    fn as_str_arg(&self) -> Option<&str> {
        (**self).as_str_arg()
    }
}

// An optional string is not a string, whichever variant it holds.
impl<T> StrArg for Option<T> {
    fn type_name(&self) -> &'static str {
        "option"
    }
    fn as_str_arg(&self) -> Option<&str> {
        None
    }
}
