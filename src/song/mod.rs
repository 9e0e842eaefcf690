// Song library: documents, sections and uploaded files

pub mod metadata;
pub mod store;
pub mod sections;
pub mod files;

pub use metadata::*;
pub use store::*;
pub use files::*;
