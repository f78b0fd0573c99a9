pub mod runner;
pub mod sensitivity;

mod ordered;
