//! Device capabilities the client depends on: location fixes and the local
//! record of actions already taken from this device.

pub mod local_actions;
pub mod location;

pub use local_actions::{ActionKind, JsonFileActionStore, LocalActionStore};
pub use location::{
    request_fix, FixOptions, LocationError, LocationFix, LocationProvider, ManualLocationProvider,
};
