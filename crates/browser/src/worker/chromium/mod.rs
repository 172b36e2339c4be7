mod document;
mod loader;

pub use document::ChromiumDocument;
pub use loader::{PageLoadResult, PageLoader};
