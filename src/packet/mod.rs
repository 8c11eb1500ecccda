mod literal_data;
mod many;
mod one_pass_signature;
mod packet_sum;
mod parser;
mod public_key;
mod secret_key;
mod signature;

pub use self::literal_data::*;
pub use self::many::*;
pub use self::one_pass_signature::*;
pub use self::packet_sum::*;
pub use self::parser::*;
pub use self::public_key::*;
pub use self::secret_key::*;
pub use self::signature::*;

use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// The shared surface of every typed packet.
pub trait PacketTrait: Serialize {
    fn packet_version(&self) -> Version;
    fn tag(&self) -> Tag;
}
