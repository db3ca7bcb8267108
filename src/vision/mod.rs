//! Network topologies and image I/O.
pub mod image;

pub mod ssd;

pub mod vgg;
