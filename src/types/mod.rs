mod fingerprint;
mod mpi;
mod packet;
mod params;
mod s2k;

pub use self::fingerprint::*;
pub use self::mpi::*;
pub use self::packet::*;
pub use self::params::*;
pub use self::s2k::*;
