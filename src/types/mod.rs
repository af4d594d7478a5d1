//! Property list value model.

mod dictionary;
mod value;

pub use dictionary::Dictionary;
pub use value::{Uid, Value};
