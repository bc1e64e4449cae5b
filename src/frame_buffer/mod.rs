mod frame_buffer;
pub use frame_buffer::{DEFAULT_CAPACITY, FrameBuffer};
