pub mod candidate;
pub mod classification;
