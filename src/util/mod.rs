#[macro_use]
pub(crate) mod macros;

pub(crate) mod parser;
