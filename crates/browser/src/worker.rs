pub mod chromium;

pub use chromium::{ChromiumDocument, PageLoadResult, PageLoader};
