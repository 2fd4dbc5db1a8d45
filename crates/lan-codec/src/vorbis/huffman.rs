//! Vorbis codebook 的规范 Huffman 码构造与查找表解码.
//!
//! 码字按条目序分配: 每个非零长度的条目取其长度下最小的空闲码字,
//! 左分支为 0, 右分支为 1. 欠满的长度表合法 (稀疏码本常见),
//! 过满的长度表拒绝. 查找表按左对齐到 32 位的码字排序,
//! 解码时逐位累积并二分查找.

use lan_core::{BitCursor, LanError, LanResult, stream_flags};

/// 查找表条目: (左对齐码字, 码长, 条目索引)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutEntry {
    /// 码字, 左对齐到 32 位高位
    pub codeword: u32,
    /// 码长 (1..=32)
    pub length: u8,
    /// codebook 条目索引
    pub entry: u32,
}

/// 排序后的 Huffman 查找表, 每个 codebook 在 setup 阶段构建一次
#[derive(Debug, Clone)]
pub struct HuffmanLut {
    /// 按 (codeword, length) 排序的条目
    entries: Vec<LutEntry>,
    /// 单项码本: 消费 1 位, 任一位值均解码为该条目
    single: Option<u32>,
}

impl HuffmanLut {
    /// 从长度表构造规范 Huffman 码的查找表
    ///
    /// 长度 0 表示条目未使用. 欠满树被接受; 过满返回
    /// [`LanError::InvalidCodebook`].
    pub fn from_lengths(lengths: &[u8]) -> LanResult<Self> {
        if let Some(&bad) = lengths.iter().find(|&&l| l > 32) {
            return Err(LanError::InvalidCodebook(format!("码长超过 32: {}", bad)));
        }

        let used: Vec<(usize, u8)> = lengths
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l > 0)
            .map(|(i, &l)| (i, l))
            .collect();

        if used.is_empty() {
            return Ok(Self {
                entries: Vec::new(),
                single: None,
            });
        }
        if used.len() == 1 {
            let (sym, len) = used[0];
            if len != 1 {
                return Err(LanError::InvalidCodebook(
                    "单项 codebook 的码长必须为 1".into(),
                ));
            }
            return Ok(Self {
                entries: vec![LutEntry {
                    codeword: 0,
                    length: 1,
                    entry: sym as u32,
                }],
                single: Some(sym as u32),
            });
        }

        // 逐长度维护最小空闲码字 (marker), 按条目序分配
        let mut marker = [0u64; 33];
        let mut entries = Vec::with_capacity(used.len());
        for (sym, len) in used {
            let l = len as usize;
            let codeword = marker[l];
            if codeword >= 1u64 << l {
                return Err(LanError::InvalidCodebook("长度表过度指定".into()));
            }
            entries.push(LutEntry {
                codeword: (codeword as u32) << (32 - l),
                length: len,
                entry: sym as u32,
            });

            // 向上进位: 找到首个奇数 marker, 其上层 marker 必已绕开本路径
            for j in (1..=l).rev() {
                if marker[j] & 1 != 0 {
                    if j == 1 {
                        marker[1] += 1;
                    } else {
                        marker[j] = marker[j - 1] << 1;
                    }
                    break;
                }
                marker[j] += 1;
            }
            // 原先悬挂在被占节点下的更长 marker 改挂到新空闲节点
            let mut prev = codeword;
            for j in (l + 1)..=32 {
                if marker[j] >> 1 == prev {
                    prev = marker[j];
                    marker[j] = marker[j - 1] << 1;
                } else {
                    break;
                }
            }
        }

        entries.sort_by(|a, b| a.codeword.cmp(&b.codeword).then(a.length.cmp(&b.length)));
        Ok(Self {
            entries,
            single: None,
        })
    }

    /// 查找表条目 (测试与诊断用)
    pub fn entries(&self) -> &[LutEntry] {
        &self.entries
    }

    /// 从游标逐位解码一个条目索引
    ///
    /// 位预算不足返回 [`LanError::Eof`] (由调用方映射);
    /// 累积 32 位仍无命中返回 `UNKNOWN_CODEWORD`.
    pub fn decode(&self, bc: &mut BitCursor<'_>) -> LanResult<u32> {
        if let Some(sym) = self.single {
            bc.read_bits(1)?;
            return Ok(sym);
        }

        let mut acc = 0u32;
        for bits_read in 1..=32u32 {
            let bit = bc.read_bits(1)?;
            acc |= bit << (32 - bits_read);
            let probe = self.entries.binary_search_by(|e| {
                e.codeword
                    .cmp(&acc)
                    .then(u32::from(e.length).cmp(&bits_read))
            });
            if let Ok(idx) = probe {
                return Ok(self.entries[idx].entry);
            }
        }
        Err(LanError::InvalidStream(stream_flags::UNKNOWN_CODEWORD))
    }
}
