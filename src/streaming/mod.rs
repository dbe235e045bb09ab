//! # Streaming Presets
//!
//! State machines of the streaming client, declared with closed enumerations
//! for the states and events known at compile time.

pub mod events;
pub mod fsm;
pub mod states;

pub use events::DashClientEvent;
pub use fsm::{register_dash_client_fsm, DashClientFsmOptions, DASH_CLIENT_HANDLER};
pub use states::DashClientState;
