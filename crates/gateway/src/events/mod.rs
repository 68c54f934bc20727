pub mod bus;
pub mod ws;

pub use bus::EventBus;
pub use ws::event_stream;
