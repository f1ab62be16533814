pub mod frames;
pub mod ws_listener;
