pub mod hash;
pub mod history;
