pub mod batcher;
pub mod debounce;
pub mod save;

pub use batcher::*;
pub use debounce::*;
pub use save::*;
