mod error;
mod fd;
mod fs;
mod layout;
pub mod path;
mod process;
mod session;
mod stat;
pub mod stdio;
mod store;
mod syscall;

pub use error::*;
pub use fd::{Fd, Handle, FIRST_FD, STDERR, STDIN, STDOUT};
pub use fs::Fs;
pub use layout::Layout;
pub use playfs_bundle::Bundle;
pub use process::Process;
pub use session::Session;
pub use stat::*;
pub use store::{FileData, Node, Store, INITIAL_CAPACITY, MAX_FILE_SIZE};
pub use syscall::{Outcome, Syscall, Value};
