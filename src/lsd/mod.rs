//! Lingvo LSD/LSA dictionary support (`C3`-`C6`).

pub mod dialect;
pub mod heading;
pub mod pages;
pub mod reader;

pub use dialect::{DialectDecoder, WString};
pub use heading::ArticleHeading;
pub use reader::{Dialect, LsdDictionary, LsdHeader};
