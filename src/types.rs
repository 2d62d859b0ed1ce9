pub mod device;
pub mod group;
pub mod push;
