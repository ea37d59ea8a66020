pub mod path;
pub mod smf_actor;

pub use path::UdpPath;
pub use smf_actor::SmfActor;
