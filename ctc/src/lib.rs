pub mod data;
pub mod decoding;
pub mod device;
pub mod labels;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod training;
