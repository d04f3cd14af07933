//! Market data and outbound signal types shared by training, evaluation and
//! the integration layer.

pub mod signal;
pub mod tick;

pub use signal::Signal;
pub use tick::{prices, Tick};
