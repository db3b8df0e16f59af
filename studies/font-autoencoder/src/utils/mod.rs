pub mod images;
pub mod plot;
