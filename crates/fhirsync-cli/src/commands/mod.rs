pub mod documents;
pub mod sync;
