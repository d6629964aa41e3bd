pub mod compare;
pub mod core;
pub mod cursor;
pub mod error;

#[cfg(test)]
mod tests;

pub use self::compare::*;
pub use self::core::*;
pub use self::cursor::*;
pub use self::error::*;
