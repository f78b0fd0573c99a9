pub mod dcf;
pub mod inputs;
