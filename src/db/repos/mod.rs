mod contacts;

pub use contacts::*;
