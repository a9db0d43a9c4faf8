//! Engine surface handed to the host: one object per open dictionary file.

mod dictionary;
mod session_pool;
#[cfg(test)]
mod tests;

pub use dictionary::{BinaryDictionary, PROPERTY_KEYS};
