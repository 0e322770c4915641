// Transport module: providers that hand out connected duplex streams
pub mod traits;
pub mod tcp;
#[cfg(target_os = "linux")]
pub mod rfcomm;

pub use traits::*;
pub use tcp::*;
#[cfg(target_os = "linux")]
pub use rfcomm::*;
