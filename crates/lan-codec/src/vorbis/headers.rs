//! Vorbis identification / comment 头包解析.
//!
//! identification 头在 7 字节标识后固定 23 字节, 多字节整数一律小端;
//! 语义校验结果打包成 16 位标志字 (按位或合并), 一次性报告全部违例.
//! comment 头只做标识校验后跳过, 其内容不属于本解码器范围.

use lan_core::{LanError, LanResult, id_header_flags};

/// identification 头的固定内容
#[derive(Debug, Clone)]
pub struct IdHeader {
    /// 声道数 (>= 1)
    pub audio_channels: u8,
    /// 采样率 (>= 1)
    pub audio_sample_rate: u32,
    /// 最大码率 (有符号, 0 表示未设置)
    pub bitrate_max: i32,
    /// 标称码率
    pub bitrate_nominal: i32,
    /// 最小码率
    pub bitrate_min: i32,
    /// 短块长指数 (块长 = 1 << blocksize_0)
    pub blocksize_0: u8,
    /// 长块长指数
    pub blocksize_1: u8,
}

impl IdHeader {
    /// 按 mode 的 blockflag 取块长
    pub fn blocksize(&self, blockflag: bool) -> u32 {
        if blockflag {
            1 << self.blocksize_1
        } else {
            1 << self.blocksize_0
        }
    }
}

/// identification 头在标识后的固定字节数
const ID_BODY_LEN: usize = 23;

fn read_le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// 解析 identification 头包
///
/// 标识缺失返回 [`LanError::MissingHeader`]; 长度不足返回
/// [`LanError::IncompleteHeader`]; 全部语义违例按位或后一次性以
/// [`LanError::InvalidIdHeader`] 报告.
pub fn parse_id_header(packet: &[u8]) -> LanResult<IdHeader> {
    if packet.len() < 7 || packet[0] != 0x01 || &packet[1..7] != b"vorbis" {
        return Err(LanError::MissingHeader);
    }
    if packet.len() < 7 + ID_BODY_LEN {
        return Err(LanError::IncompleteHeader);
    }
    let body = &packet[7..];

    let mut flags = 0u16;

    let version = read_le_u32(&body[0..4]);
    if version != 0 {
        flags |= id_header_flags::VORBIS_VERSION;
    }

    let audio_channels = body[4];
    if audio_channels == 0 {
        flags |= id_header_flags::AUDIO_CHANNELS;
    }

    let audio_sample_rate = read_le_u32(&body[5..9]);
    if audio_sample_rate == 0 {
        flags |= id_header_flags::SAMPLE_RATE;
    }

    let bitrate_max = read_le_u32(&body[9..13]) as i32;
    let bitrate_nominal = read_le_u32(&body[13..17]) as i32;
    let bitrate_min = read_le_u32(&body[17..21]) as i32;

    let blocksize_0 = body[21] & 0x0F;
    let blocksize_1 = body[21] >> 4;
    if !(6..=13).contains(&blocksize_0)
        || !(6..=13).contains(&blocksize_1)
        || blocksize_0 > blocksize_1
    {
        flags |= id_header_flags::BLOCKSIZE;
    }

    if body[22] & 0x01 == 0 {
        flags |= id_header_flags::FRAMING_BIT;
    }

    if flags != 0 {
        return Err(LanError::InvalidIdHeader(flags));
    }

    Ok(IdHeader {
        audio_channels,
        audio_sample_rate,
        bitrate_max,
        bitrate_nominal,
        bitrate_min,
        blocksize_0,
        blocksize_1,
    })
}

/// 校验 comment 头包标识后跳过
pub fn check_comment_header(packet: &[u8]) -> LanResult<()> {
    if packet.len() < 7 || packet[0] != 0x03 || &packet[1..7] != b"vorbis" {
        return Err(LanError::MissingHeader);
    }
    Ok(())
}
