pub mod channel;
pub mod connection;
pub mod registry;

pub use channel::Channel;
pub use connection::{GatewayServices, handle_connection};
pub use registry::{DeliveryError, Listener, Registry, SubscriptionHandle};
