mod cents;
mod energy;

pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError};
pub use energy::{EnergyConversionError, WattHours};
pub use secret::Secret;
