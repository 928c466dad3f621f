pub mod classify;
pub mod owners;
pub mod payload;

pub mod util;
