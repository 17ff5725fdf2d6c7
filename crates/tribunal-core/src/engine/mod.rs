pub mod dispatcher;
pub mod runner;
