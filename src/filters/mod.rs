pub mod kalman;

pub use kalman::{DtPolicy, FilterConfig, FilterError, PlanarKalman};
