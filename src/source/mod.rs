mod interface;
pub mod mock;
mod simulated;

pub use interface::{FrameSource, FrameStream};
pub use mock::{CallLog, MockFrameSource, SourceCall, SourceOp};
pub use simulated::{frame_with_block, uniform_frame, SimulatedFrameSource};
