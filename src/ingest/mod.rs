pub mod codec;
pub mod file_tailer;
pub mod udp_listener;

pub use codec::{decode_record, CodecError};
pub use file_tailer::{AsyncFileTailer, FileTailer};
pub use udp_listener::{AsyncUdpRecordListener, UdpRecordListener};
