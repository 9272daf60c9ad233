//! Container format handling
//!
//! Only Flash Video is supported. The container layer decodes headers and
//! tags; the buffering engine in [`crate::media`] drives it.

pub mod flv;
