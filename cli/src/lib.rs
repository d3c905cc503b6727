pub mod command;
pub mod session;

pub use command::{parse, Command};
pub use session::{Outcome, Session};
