//! # lan-format
//!
//! Lan 解码框架容器层, 负责 Ogg 容器的页面扫描与 packet 组装.
//!
//! 输入是一整段借用的字节缓冲区 (通常为完整的 Ogg 文件), 输出是按逻辑流
//! 分组的页面序列, 以及从页面段表拼装出的 Vorbis packet.

pub mod assembler;
pub mod ogg;

// 重导出常用类型
pub use assembler::{OggPacket, PacketCursor, next_packet};
pub use ogg::{LogicalStream, OggPage, split_streams};
