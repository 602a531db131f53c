pub mod core;
pub mod result;
pub mod state;

pub use core::CascadeExecutor;
pub use result::CascadeResult;
pub use state::Phase;
