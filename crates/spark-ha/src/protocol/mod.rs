//! 协议版本值与受支持版本表。

mod table;
mod version;

pub use table::{ClientFactory, ProtocolVersionEntry, ProtocolVersionTable};
pub use version::{INTERNAL_PROTOCOL_VERSION, ProtocolVersion};
