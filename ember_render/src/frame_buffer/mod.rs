/// Frame buffer module - attachments and their derived render pass

pub mod attachment;
pub mod frame_buffer;

pub use attachment::*;
pub use frame_buffer::*;
