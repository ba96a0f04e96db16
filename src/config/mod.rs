pub mod settings;

pub use settings::ForecastConfig;
