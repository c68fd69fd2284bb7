pub mod collector;
pub mod heap;
pub mod platform;
pub mod ps;
pub mod sampler;
