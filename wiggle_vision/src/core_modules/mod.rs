pub mod motion_state;
pub mod pixel_buffer;
pub mod pixel_diff;
