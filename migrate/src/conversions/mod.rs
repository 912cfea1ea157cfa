//! Total conversions from [`crate::types::SourceValue`] into sink column values.
//!
//! None of these functions fail: input that cannot be converted yields `None`, which the
//! transformer stores as null.

pub mod array;
pub mod numeric;
pub mod presence;
pub mod text;
