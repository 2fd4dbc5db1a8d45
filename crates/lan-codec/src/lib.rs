//! # lan-codec
//!
//! Lan 解码框架编解码层, 当前提供 Vorbis 解码器的前半程:
//! 三个头包 (identification/comment/setup) 的解析与校验, 以及音频包头的
//! 解码 (mode 选择、窗形推导、逐声道 floor 曲线量化 Y 值重建).
//!
//! residue 解码体、声道耦合逆变换与 IMDCT 属于后续阶段, 不在本 crate 范围内.

pub mod vorbis;

// 重导出常用类型
pub use vorbis::{AudioPacketHead, ChannelFloor, PacketOutcome, VorbisDecoder};
