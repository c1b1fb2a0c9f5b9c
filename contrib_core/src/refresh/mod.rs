pub mod engine;
pub mod paging;
pub mod traits;
