pub mod hagan;
pub mod sabr_calibrator;
pub mod sabr_model;
