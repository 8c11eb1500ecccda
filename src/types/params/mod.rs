mod ecdsa;
mod public;
mod secret;

pub use self::ecdsa::*;
pub use self::public::*;
pub use self::secret::*;
