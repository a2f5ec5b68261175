//! Tools the model can invoke
//!
//! - `executeCommand` → [`CommandExecutor`]
//! - `writeFile` → [`FileWriter`]
//!
//! Both return plain text starting with `Success:` or `Error:`. The model
//! reads that prefix to decide whether to continue or fix something.

pub mod command;
pub mod file_writer;
pub mod registry;

pub use command::{CommandError, CommandExecutor, CommandRecord};
pub use file_writer::{FileWriter, WriteError};
pub use registry::{BuiltinTool, ToolRegistry};
