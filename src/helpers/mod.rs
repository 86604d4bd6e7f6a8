//! Small helpers shared across modules.
pub mod reference;
pub(crate) mod string;
