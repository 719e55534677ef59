pub mod connection;
pub mod state;

pub use connection::{StatusListener, WebRtcSession};
pub use state::{StatusClass, StatusUpdate, WebRtcState};
