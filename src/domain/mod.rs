pub mod axes;
pub mod imu;
pub mod models;
pub mod settings;
