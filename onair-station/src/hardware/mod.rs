mod bridge;
mod port;
mod relay;

pub use bridge::*;
pub use port::*;
pub use relay::*;
