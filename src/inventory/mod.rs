//! File inventory: the canonical list of files a plan is built from.

pub mod category;
pub mod filter;
pub mod record;

pub use category::{Classifier, FileCategory};
pub use filter::PathFilter;
pub use record::{ChangeKind, FileInput, FileInventory, FileRecord, SizeFallback, normalize_path};
