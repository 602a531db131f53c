pub mod assembler;
pub mod emitter;
pub mod event;

pub use assembler::{AssemblerEvent, ToolCallAssembler};
pub use event::StreamEvent;
