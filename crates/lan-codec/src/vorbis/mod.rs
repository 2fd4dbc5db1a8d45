//! Vorbis 音频解码器 (前半程).
//!
//! 实现范围:
//! - 三个头包 (identification/comment/setup) 的解析与校验
//! - 音频包头解码: 包类型、mode 选择、窗形推导
//! - 逐声道 floor 解码, 重建 floor1 曲线的量化 Y 值
//!
//! residue 解码体、声道耦合逆变换与 IMDCT 是后续阶段的边界, 不在此实现.

pub mod codebook;
pub mod floor;
pub mod headers;
pub mod huffman;
pub mod setup;
pub mod window;

use lan_core::{BitCursor, LanError, LanResult, ilog, stream_flags};
use log::debug;

use self::floor::{FloorCurve, decode_floor0_head, decode_floor1};
use self::headers::{IdHeader, check_comment_header, parse_id_header};
use self::setup::{Floor, SetupHeader, parse_setup_packet};
use self::window::{WindowParams, derive_window};

/// 头包阶段状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderStage {
    Identification,
    Comment,
    Setup,
    Audio,
}

/// `send_packet` 的逐包结果
#[derive(Debug)]
pub enum PacketOutcome {
    /// identification 头解析完成
    IdentificationParsed,
    /// comment 头已校验并跳过
    CommentSkipped,
    /// setup 头解析完成, 解码器进入音频阶段
    SetupParsed,
    /// 一个音频包头解码完成
    Audio(AudioPacketHead),
}

/// 一个音频包头的解码结果
#[derive(Debug)]
pub struct AudioPacketHead {
    /// mode 索引
    pub mode_index: usize,
    /// 本包块长
    pub blocksize: u32,
    /// 窗参数
    pub window: WindowParams,
    /// 各声道的 floor 解码结果
    pub channel_floors: Vec<ChannelFloor>,
}

/// 一个声道的 floor 解码结果
#[derive(Debug)]
pub enum ChannelFloor {
    /// 本包该声道无 floor 信息, 输出静音
    Unused,
    /// floor0 包头已读出幅值; 音频域包络重建未实现
    Floor0 {
        /// 包头幅值
        amplitude: u32,
    },
    /// floor1 重建的量化 Y 曲线
    Curve(FloorCurve),
}

/// Vorbis 解码器状态
///
/// 三个头包依序喂入后状态只读, 音频包仅借用已建好的表;
/// 音频包解码失败不影响解码器继续处理后续包.
pub struct VorbisDecoder {
    stage: HeaderStage,
    id_header: Option<IdHeader>,
    setup: Option<SetupHeader>,
}

impl VorbisDecoder {
    /// 创建解码器, 等待 identification 头
    pub fn new() -> Self {
        Self {
            stage: HeaderStage::Identification,
            id_header: None,
            setup: None,
        }
    }

    /// 已解析的 identification 头
    pub fn id_header(&self) -> Option<&IdHeader> {
        self.id_header.as_ref()
    }

    /// 已解析的 setup 头
    pub fn setup(&self) -> Option<&SetupHeader> {
        self.setup.as_ref()
    }

    /// 送入一个完整的 Vorbis packet
    ///
    /// 前三个包按 identification/comment/setup 顺序解析;
    /// 其后每个包按音频包头解码并返回 [`PacketOutcome::Audio`].
    pub fn send_packet(&mut self, packet: &[u8]) -> LanResult<PacketOutcome> {
        match self.stage {
            HeaderStage::Identification => {
                let id = parse_id_header(packet)?;
                debug!(
                    "Vorbis: identification 头解析完成, {} 声道 {} Hz",
                    id.audio_channels, id.audio_sample_rate,
                );
                self.id_header = Some(id);
                self.stage = HeaderStage::Comment;
                Ok(PacketOutcome::IdentificationParsed)
            }
            HeaderStage::Comment => {
                check_comment_header(packet)?;
                self.stage = HeaderStage::Setup;
                Ok(PacketOutcome::CommentSkipped)
            }
            HeaderStage::Setup => {
                let id = self
                    .id_header
                    .as_ref()
                    .ok_or_else(|| LanError::Internal("setup 前缺少 identification 头".into()))?;
                let setup = parse_setup_packet(packet, id.audio_channels)?;
                self.setup = Some(setup);
                self.stage = HeaderStage::Audio;
                Ok(PacketOutcome::SetupParsed)
            }
            HeaderStage::Audio => self.decode_audio_packet(packet).map(PacketOutcome::Audio),
        }
    }

    fn decode_audio_packet(&self, packet: &[u8]) -> LanResult<AudioPacketHead> {
        let id = self
            .id_header
            .as_ref()
            .ok_or_else(|| LanError::Internal("音频包前缺少 identification 头".into()))?;
        let setup = self
            .setup
            .as_ref()
            .ok_or_else(|| LanError::Internal("音频包前缺少 setup 头".into()))?;

        // 包头部分的位耗尽是包级错误, 不同于 floor 内部的合法截断
        let map_eop = |e: LanError| match e {
            LanError::Eof => LanError::InvalidStream(stream_flags::END_OF_PACKET),
            other => other,
        };

        let mut bc = BitCursor::new(packet);

        let packet_type = bc.read_bits(1).map_err(map_eop)?;
        if packet_type != 0 {
            return Err(LanError::InvalidStream(
                stream_flags::UNEXPECTED_NON_AUDIO_PACKET,
            ));
        }

        let mode_bits = ilog(setup.modes.len() as u32 - 1);
        let mode_index = bc.read_bits(mode_bits).map_err(map_eop)? as usize;
        if mode_index >= setup.modes.len() {
            return Err(LanError::InvalidStream(stream_flags::UNDECODABLE_PACKET));
        }
        let mode = setup.modes[mode_index];

        let blocksize = id.blocksize(mode.blockflag);

        // 长块才携带前后窗标志
        let (prev_window, next_window) = if mode.blockflag {
            (
                bc.read_flag().map_err(map_eop)?,
                bc.read_flag().map_err(map_eop)?,
            )
        } else {
            (false, false)
        };

        let window = derive_window(
            blocksize,
            1u32 << id.blocksize_0,
            mode.blockflag,
            prev_window,
            next_window,
        );

        let mapping = &setup.mappings[usize::from(mode.mapping)];
        let mut channel_floors = Vec::with_capacity(usize::from(id.audio_channels));
        for channel in 0..usize::from(id.audio_channels) {
            let submap = usize::from(mapping.channel_mux[channel]);
            let floor_index = usize::from(mapping.submap_floors[submap]);
            let decoded = match &setup.floors[floor_index] {
                Floor::Type0(floor0) => {
                    match decode_floor0_head(&mut bc, floor0, setup.codebooks.len())? {
                        Some(amplitude) => ChannelFloor::Floor0 { amplitude },
                        None => ChannelFloor::Unused,
                    }
                }
                Floor::Type1(floor1) => {
                    match decode_floor1(&mut bc, floor1, &setup.codebooks)? {
                        Some(curve) => ChannelFloor::Curve(curve),
                        None => ChannelFloor::Unused,
                    }
                }
            };
            channel_floors.push(decoded);
        }

        // residue/耦合/IMDCT 属于后续解码阶段
        Ok(AudioPacketHead {
            mode_index,
            blocksize,
            window,
            channel_floors,
        })
    }
}

impl Default for VorbisDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vorbis::setup::tests::write_minimal_setup_body;
    use lan_core::BitWriter;

    fn build_id_packet() -> Vec<u8> {
        let mut v = vec![0x01];
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(1); // 单声道
        v.extend_from_slice(&44100u32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.extend_from_slice(&128000i32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.push((11 << 4) | 8);
        v.push(1);
        v
    }

    fn build_comment_packet() -> Vec<u8> {
        let mut v = vec![0x03];
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&[0u8; 8]);
        v
    }

    fn build_setup_packet() -> Vec<u8> {
        let mut v = vec![0x05];
        v.extend_from_slice(b"vorbis");
        let mut bw = BitWriter::new();
        write_minimal_setup_body(&mut bw, &[32, 96]);
        v.extend_from_slice(&bw.finish());
        v
    }

    /// mode 0 (blockflag=0) 的音频包: floor1 数据同 floor 模块测试
    fn build_audio_packet() -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bit(0); // packet_type = 音频
        // mode_count=1 -> ilog(0)=0 位 mode 索引; 短块无窗标志
        bw.write_flag(true); // floor1 nonzero
        bw.write_bits(30, 8); // y0
        bw.write_bits(25, 8); // y1
        bw.write_bit(1); // Y2
        bw.write_bit(0); // Y3
        bw.finish()
    }

    fn decoder_after_headers() -> VorbisDecoder {
        let mut dec = VorbisDecoder::new();
        assert!(matches!(
            dec.send_packet(&build_id_packet()).unwrap(),
            PacketOutcome::IdentificationParsed,
        ));
        assert!(matches!(
            dec.send_packet(&build_comment_packet()).unwrap(),
            PacketOutcome::CommentSkipped,
        ));
        assert!(matches!(
            dec.send_packet(&build_setup_packet()).unwrap(),
            PacketOutcome::SetupParsed,
        ));
        dec
    }

    #[test]
    fn test_头包三段依序解析() {
        let dec = decoder_after_headers();
        let id = dec.id_header().expect("应有 identification 头");
        assert_eq!(id.audio_channels, 1);
        assert_eq!(id.blocksize_0, 8);
        let setup = dec.setup().expect("应有 setup 头");
        assert_eq!(setup.modes.len(), 1);
    }

    #[test]
    fn test_头包乱序报错() {
        let mut dec = VorbisDecoder::new();
        assert!(matches!(
            dec.send_packet(&build_comment_packet()),
            Err(LanError::MissingHeader),
        ));
    }

    #[test]
    fn test_音频包头解码() {
        let mut dec = decoder_after_headers();
        let outcome = dec.send_packet(&build_audio_packet()).expect("音频包解码失败");
        let PacketOutcome::Audio(head) = outcome else {
            panic!("期望音频包结果");
        };

        assert_eq!(head.mode_index, 0);
        assert_eq!(head.blocksize, 256);
        assert_eq!(head.window.left_start, 0);
        assert_eq!(head.window.right_end, 256);
        assert_eq!(head.channel_floors.len(), 1);

        let ChannelFloor::Curve(curve) = &head.channel_floors[0] else {
            panic!("期望 floor1 曲线");
        };
        assert_eq!(curve.final_ys, vec![30, 25, 28, 26]);
        assert_eq!(curve.used, vec![true, true, true, false]);
    }

    #[test]
    fn test_非音频包类型() {
        let mut dec = decoder_after_headers();
        let packet = [0x01u8]; // 首位为 1
        assert!(matches!(
            dec.send_packet(&packet),
            Err(LanError::InvalidStream(f))
                if f == stream_flags::UNEXPECTED_NON_AUDIO_PACKET,
        ));
        // 失败的音频包不影响解码器继续工作
        assert!(matches!(
            dec.send_packet(&build_audio_packet()),
            Ok(PacketOutcome::Audio(_)),
        ));
    }

    #[test]
    fn test_空音频包() {
        let mut dec = decoder_after_headers();
        assert!(matches!(
            dec.send_packet(&[]),
            Err(LanError::InvalidStream(f)) if f == stream_flags::END_OF_PACKET,
        ));
    }

    #[test]
    fn test_floor截断声道静音() {
        let mut dec = decoder_after_headers();
        // 只含包类型位与 nonzero 位, floor 数据缺失
        let mut bw = BitWriter::new();
        bw.write_bit(0);
        bw.write_flag(true);
        let packet = bw.finish();

        let PacketOutcome::Audio(head) = dec.send_packet(&packet).expect("应按截断处理") else {
            panic!("期望音频包结果");
        };
        assert!(matches!(head.channel_floors[0], ChannelFloor::Unused));
    }
}
