mod activation;
mod license;
mod plugin;

pub use activation::*;
pub use license::*;
pub use plugin::*;
