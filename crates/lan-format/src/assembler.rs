//! Vorbis packet 组装器.
//!
//! 一个 packet 由页面段表中连续的段拼接而成, 终止于首个长度小于 255 的段;
//! 长度恰为 255 的段表示 packet 在下一段继续, 并可跨越页面边界.
//! 组装器只搬运字节, 不解释 packet 内容.
//!
//! 游标语义: `(page, segment)` 指向下一个待消费的段. 游标已越过最后一页时
//! 返回 [`LanError::EndOfStream`]; 续延途中页面耗尽则是流本身非法, 返回
//! [`LanError::InvalidStream`].

use bytes::Bytes;
use lan_core::{LanError, LanResult};

use crate::ogg::OggPage;

/// packet 组装游标: 指向某页内的某段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketCursor {
    /// 页面索引
    pub page: usize,
    /// 页内段索引
    pub segment: usize,
}

impl PacketCursor {
    /// 创建指向流起点的游标
    pub fn start() -> Self {
        Self::default()
    }
}

/// 组装完成的一个 packet
#[derive(Debug, Clone)]
pub struct OggPacket {
    /// packet 字节 (各段按段序拼接)
    pub data: Bytes,
    /// packet 结束页的粒度位置
    pub granule_position: i64,
}

impl OggPacket {
    /// packet 长度 (字节)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空 packet (单个 0 长度段)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 从游标处组装下一个 packet, 返回 packet 与推进后的游标
pub fn next_packet<'a>(
    pages: &[OggPage<'a>],
    cursor: PacketCursor,
) -> LanResult<(OggPacket, PacketCursor)> {
    let mut page = cursor.page;
    let mut segment = cursor.segment;

    // 跳过空页/越界段索引, 归一化到首个实际存在的段
    while page < pages.len() && segment >= pages[page].segment_count() {
        page += 1;
        segment = 0;
    }
    if page >= pages.len() {
        return Err(LanError::EndOfStream);
    }

    let mut data = Vec::new();
    // 游标可能指向页中段, 先累加前缀段长得到字节偏移
    let mut offset: usize = pages[page].segment_table[..segment]
        .iter()
        .map(|&s| s as usize)
        .sum();

    loop {
        let seg_len = pages[page].segment_table[segment] as usize;
        data.extend_from_slice(&pages[page].data[offset..offset + seg_len]);
        offset += seg_len;
        segment += 1;

        if seg_len < 255 {
            break;
        }

        // 续延: 段表耗尽则进入下一页
        if segment >= pages[page].segment_count() {
            page += 1;
            segment = 0;
            offset = 0;
            // 连续 255 段延续到流末尾之外
            if page >= pages.len() {
                return Err(LanError::InvalidStream(0));
            }
        }
    }

    let granule_position = pages[page].granule_position;

    // 归一化: 恰好消费完整页时, 游标推进到下一页首段
    let mut next = PacketCursor { page, segment };
    if next.page < pages.len() && next.segment == pages[next.page].segment_count() {
        next.page += 1;
        next.segment = 0;
    }

    Ok((
        OggPacket {
            data: Bytes::from(data),
            granule_position,
        },
        next,
    ))
}
