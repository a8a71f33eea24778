pub mod agreement;
pub mod calibration;
pub mod power;
pub mod power_logistic;
pub mod roc;
pub mod saturation;
pub mod sensitivity;
pub mod stabilization;
pub mod uniformity;
