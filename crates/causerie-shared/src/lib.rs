pub mod constants;
pub mod error;
pub mod fragment;
pub mod frame;

pub use error::{FragmentError, FrameError};
pub use fragment::Fragment;
pub use frame::{Frame, MessageType};
