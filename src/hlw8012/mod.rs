pub mod clock;
pub mod config;
pub mod converter;
pub mod edge;
pub mod error;
pub mod integrator;
pub mod readings;
pub mod selector;
pub mod sensor;

pub use clock::MonotonicClock;
pub use config::SensorConfig;
pub use edge::{EdgeTimestamps, Line};
pub use error::{InitError, SensorError, SensorResult, Stage};
pub use integrator::EnergyIntegrator;
pub use readings::{Readings, SensorStats};
pub use selector::{Channel, ChannelSelector};
pub use sensor::Hlw8012;
