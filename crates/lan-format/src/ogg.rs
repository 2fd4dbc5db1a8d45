//! Ogg 容器页面扫描.
//!
//! # Ogg 页面结构 (RFC 3533)
//! ```text
//! Capture pattern: "OggS" (4 bytes)
//! Version:         1 byte (always 0)
//! Header type:     1 byte (flags: continued=0x01, BOS=0x02, EOS=0x04)
//! Granule pos:     8 bytes (little-endian, codec-specific)
//! Serial number:   4 bytes (identifies logical stream)
//! Page seq no:     4 bytes
//! CRC checksum:    4 bytes
//! Num segments:    1 byte
//! Segment table:   N bytes (each 1 byte, packet sizes)
//! Page data:       sum(segment_table) bytes
//! ```
//!
//! 页面只做结构解析并按 serial 分组, 所有字段均为输入缓冲区上的借用视图;
//! CRC 字段原样保留, 不做校验. 段表中连续的 255 值段与其后首个非 255 值段
//! 组合成一个完整 packet, 拼装逻辑见 [`crate::assembler`].

use log::debug;

/// Ogg 同步字 (capture pattern)
pub const OGG_SYNC: &[u8; 4] = b"OggS";

/// 页面头部标志
const FLAG_CONTINUED: u8 = 0x01;
const FLAG_BOS: u8 = 0x02;
const FLAG_EOS: u8 = 0x04;

/// 页面头固定部分长度 (同步字到段数)
const PAGE_HEADER_LEN: usize = 27;

/// 已解析的 Ogg 页面 (输入缓冲区上的借用视图)
#[derive(Debug, Clone, Copy)]
pub struct OggPage<'a> {
    /// 头部标志
    pub header_type: u8,
    /// 粒度位置 (负值表示本页无可用时间戳)
    pub granule_position: i64,
    /// 逻辑流序列号
    pub serial_number: u32,
    /// 页面序号
    pub page_sequence: u32,
    /// 页面 CRC (原样保留, 不校验)
    pub checksum: u32,
    /// 段表
    pub segment_table: &'a [u8],
    /// 页面数据
    pub data: &'a [u8],
}

impl<'a> OggPage<'a> {
    /// 是否为 BOS (beginning of stream) 页面
    pub fn is_bos(&self) -> bool {
        self.header_type & FLAG_BOS != 0
    }

    /// 是否为 EOS (end of stream) 页面
    pub fn is_eos(&self) -> bool {
        self.header_type & FLAG_EOS != 0
    }

    /// 是否为续延页面 (前一个 packet 的延续)
    pub fn is_continued(&self) -> bool {
        self.header_type & FLAG_CONTINUED != 0
    }

    /// 段数
    pub fn segment_count(&self) -> usize {
        self.segment_table.len()
    }

    /// 在指定偏移处尝试解析一个页面, 返回页面与下一个扫描位置
    fn parse_at(buff: &'a [u8], pos: usize) -> ParseOutcome<'a> {
        let head = &buff[pos..];
        if head.len() < PAGE_HEADER_LEN {
            return ParseOutcome::Truncated;
        }
        if &head[0..4] != OGG_SYNC {
            return ParseOutcome::Invalid;
        }
        // 结构版本必须为 0, 头部标志高半字节保留为 0
        if head[4] != 0 || head[5] & 0xF0 != 0 {
            return ParseOutcome::Invalid;
        }

        let granule_position = i64::from_le_bytes([
            head[6], head[7], head[8], head[9], head[10], head[11], head[12], head[13],
        ]);
        let serial_number = u32::from_le_bytes([head[14], head[15], head[16], head[17]]);
        let page_sequence = u32::from_le_bytes([head[18], head[19], head[20], head[21]]);
        let checksum = u32::from_le_bytes([head[22], head[23], head[24], head[25]]);
        let segment_count = head[26] as usize;

        if head.len() < PAGE_HEADER_LEN + segment_count {
            return ParseOutcome::Truncated;
        }
        let segment_table = &head[PAGE_HEADER_LEN..PAGE_HEADER_LEN + segment_count];
        let data_size: usize = segment_table.iter().map(|&s| s as usize).sum();

        let data_start = PAGE_HEADER_LEN + segment_count;
        if head.len() < data_start + data_size {
            return ParseOutcome::Truncated;
        }
        let data = &head[data_start..data_start + data_size];

        ParseOutcome::Page {
            page: OggPage {
                header_type: head[5],
                granule_position,
                serial_number,
                page_sequence,
                checksum,
                segment_table,
                data,
            },
            next_pos: pos + data_start + data_size,
        }
    }
}

enum ParseOutcome<'a> {
    Page { page: OggPage<'a>, next_pos: usize },
    /// 同步字处的候选页面字段非法, 从下一字节重新搜索
    Invalid,
    /// 页面在缓冲区末尾被截断, 丢弃并停止扫描
    Truncated,
}

/// 一条逻辑流: serial 与其页面序列 (按出现顺序)
#[derive(Debug, Clone)]
pub struct LogicalStream<'a> {
    /// 逻辑流序列号
    pub serial: u32,
    /// 属于该流的页面, 按文件顺序
    pub pages: Vec<OggPage<'a>>,
}

impl LogicalStream<'_> {
    /// 首页面载荷是否以 Vorbis identification 头标识开始
    pub fn is_vorbis(&self) -> bool {
        self.pages
            .first()
            .map(|p| p.data.len() >= 7 && p.data[0] == 0x01 && &p.data[1..7] == b"vorbis")
            .unwrap_or(false)
    }
}

/// 扫描缓冲区中的全部 Ogg 页面并按 serial 分组
///
/// 逐字节搜索 "OggS" 同步字; 候选位置上字段非法时从下一字节继续,
/// 末尾截断的页面被丢弃. 逻辑流按首次出现顺序排列.
pub fn split_streams(buff: &[u8]) -> Vec<LogicalStream<'_>> {
    let mut streams: Vec<LogicalStream<'_>> = Vec::new();
    let mut pos = 0usize;

    while pos + PAGE_HEADER_LEN <= buff.len() {
        let Some(found) = find_sync(buff, pos) else {
            break;
        };
        match OggPage::parse_at(buff, found) {
            ParseOutcome::Page { page, next_pos } => {
                match streams.iter().position(|s| s.serial == page.serial_number) {
                    Some(idx) => streams[idx].pages.push(page),
                    None => {
                        debug!(
                            "Ogg: 发现逻辑流 serial=0x{:08X} (bos={})",
                            page.serial_number,
                            page.is_bos(),
                        );
                        streams.push(LogicalStream {
                            serial: page.serial_number,
                            pages: vec![page],
                        });
                    }
                }
                pos = next_pos;
            }
            ParseOutcome::Invalid => pos = found + 1,
            ParseOutcome::Truncated => {
                debug!("Ogg: 偏移 {} 处页面被截断, 停止扫描", found);
                break;
            }
        }
    }

    streams
}

/// 从 pos 起搜索下一个同步字位置
fn find_sync(buff: &[u8], pos: usize) -> Option<usize> {
    buff[pos..]
        .windows(4)
        .position(|w| w == OGG_SYNC)
        .map(|i| pos + i)
}
