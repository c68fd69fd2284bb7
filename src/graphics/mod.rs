//! Image side of the harness: the source PNG, decoded surfaces and the
//! textures drawn from them. Nothing in here knows about the terminal or the
//! operating system.

pub mod ledger;
pub mod source;
pub mod surface;
pub mod texture;
