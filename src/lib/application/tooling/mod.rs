mod content;
mod dispatcher;
mod error;
mod interface;
mod process;
mod registry;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use content::{CallOutcome, ContentBlock, normalize};
pub use dispatcher::{Dispatcher, ToolResult, cancelled_message, not_found_message};
pub use error::ToolInvokeError;
pub use interface::{ServerToolInfo, ToolSession};
pub use process::McpProcess;
pub use registry::{CatalogEntry, ToolCatalog};
pub use session::{MAX_LIST_PAGES, McpSession, SessionState};
