pub mod series;
pub mod trade;

pub use series::*;
pub use trade::*;
