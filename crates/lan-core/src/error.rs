//! 统一错误类型定义.
//!
//! 所有 Lan crate 共用的错误类型, 支持跨模块传播.
//! 与包级错误码对应的细分标志以 16 位标志字携带, 标志之间按位或合并.

use thiserror::Error;

/// identification 头包语义错误的标志位
pub mod id_header_flags {
    /// vorbis_version 非 0
    pub const VORBIS_VERSION: u16 = 0x01;
    /// audio_channels 为 0
    pub const AUDIO_CHANNELS: u16 = 0x02;
    /// audio_sample_rate 为 0
    pub const SAMPLE_RATE: u16 = 0x04;
    /// blocksize 指数越界或 blocksize_0 > blocksize_1
    pub const BLOCKSIZE: u16 = 0x08;
    /// framing bit 非 1
    pub const FRAMING_BIT: u16 = 0x10;
}

/// 音频包码流错误的标志位
pub mod stream_flags {
    /// 必需读取越过包内剩余位数
    pub const END_OF_PACKET: u16 = 0x01;
    /// 包类型位非 0 (遇到非音频包)
    pub const UNEXPECTED_NON_AUDIO_PACKET: u16 = 0x02;
    /// 包内字段引用了不存在的表项
    pub const UNDECODABLE_PACKET: u16 = 0x04;
    /// 累积 32 位仍未命中任何 Huffman 码字
    pub const UNKNOWN_CODEWORD: u16 = 0x08;
}

/// Lan 框架统一错误类型
#[derive(Debug, Error)]
pub enum LanError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达数据末尾 (位流游标越界的原始信号, 由上层映射为具体语义)
    #[error("已到达数据末尾")]
    Eof,

    /// 期望的头包标识字节缺失
    #[error("Vorbis 头包标识缺失")]
    MissingHeader,

    /// 头包解析过程中位预算不足
    #[error("Vorbis 头包数据不足")]
    IncompleteHeader,

    /// identification 头包语义非法, 标志位见 [`id_header_flags`]
    #[error("Vorbis identification 头包非法: flags=0x{0:02X}")]
    InvalidIdHeader(u16),

    /// codebook 长度表无法构成合法前缀码 (过度指定)
    #[error("Vorbis codebook 非法: {0}")]
    InvalidCodebook(String),

    /// setup 头包语义非法
    #[error("Vorbis setup 头包非法: {0}")]
    InvalidSetup(String),

    /// 音频包码流非法, 标志位见 [`stream_flags`]
    #[error("Vorbis 音频包码流非法: flags=0x{0:02X}")]
    InvalidStream(u16),

    /// packet 组装器无法开始下一个 packet
    #[error("逻辑流已结束")]
    EndOfStream,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Lan 框架统一 Result 类型
pub type LanResult<T> = Result<T, LanError>;
