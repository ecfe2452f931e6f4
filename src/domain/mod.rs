// Domain layer: tracking models and ports. No transport details here.

pub mod model;
pub mod ports;
