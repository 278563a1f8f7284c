mod convert;

pub use convert::*;

#[cfg(test)]
mod convert_test;
