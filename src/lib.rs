//! # Lan (澜)
//!
//! 纯 Rust 实现的 Ogg/Vorbis 解码前半程: 从 Ogg 字节流重建逻辑流与
//! packet, 解析三个 Vorbis 头包, 并解码音频包头 (mode 选择、窗形推导、
//! 逐声道 floor 曲线量化 Y 值重建).
//!
//! residue 解码体、声道耦合逆变换与 IMDCT 属于后续阶段的边界.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use lan::codec::VorbisDecoder;
//! use lan::format::{PacketCursor, next_packet, split_streams};
//!
//! let buff: Vec<u8> = std::fs::read("audio.ogg")?;
//! let streams = split_streams(&buff);
//! let stream = streams
//!     .iter()
//!     .find(|s| s.is_vorbis())
//!     .ok_or("未找到 Vorbis 流")?;
//!
//! let mut decoder = VorbisDecoder::new();
//! let mut cursor = PacketCursor::start();
//! while let Ok((packet, next)) = next_packet(&stream.pages, cursor) {
//!     let outcome = decoder.send_packet(&packet.data)?;
//!     println!("{:?}", outcome);
//!     cursor = next;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `lan-core` | 错误类型与 LSB 位流读写 |
//! | `lan-format` | Ogg 页面扫描与 packet 组装 |
//! | `lan-codec` | Vorbis 头包与音频包前半程解码 |

/// 错误类型与位流工具
pub use lan_core as core;

/// Vorbis 解码器
pub use lan_codec as codec;

/// Ogg 容器层
pub use lan_format as format;

/// 获取 Lan 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
