//! Vorbis codebook 语法解析.
//!
//! 每个 codebook 以 24 位同步字 0x564342 ("BCV") 开始, 依次携带维度、
//! 条目数、码长表 (ordered/sparse 两种布局) 与可选的 VQ lookup 配置.
//! 码长表在解析完成时即构建一次规范 Huffman 查找表, 供音频包解码复用.

use lan_core::{BitCursor, LanError, LanResult, ilog};

use super::huffman::HuffmanLut;

/// codebook 同步字
const CODEBOOK_SYNC: u32 = 0x564342;

/// VQ lookup 配置 (lookup_type 1 或 2)
#[derive(Debug, Clone)]
pub struct CodebookLookup {
    /// lookup 类型: 1 = 隐式网格, 2 = 显式表
    pub lookup_type: u8,
    /// 最小值 (float32_unpack 解出)
    pub min_value: f32,
    /// 步长 (float32_unpack 解出)
    pub delta_value: f32,
    /// 每个乘数的位宽 (1..=16)
    pub value_bits: u8,
    /// 序列标志: 各维累加前值
    pub sequence_p: bool,
    /// 乘数表
    pub multiplicands: Vec<u32>,
}

/// 一个已解析的 codebook
#[derive(Debug, Clone)]
pub struct Codebook {
    /// 向量维度 (1..65535)
    pub dimensions: u16,
    /// 条目数 (1..2^24)
    pub entry_count: u32,
    /// 各条目码长, 0 表示未使用
    pub entry_lengths: Vec<u8>,
    /// VQ lookup 配置, lookup_type=0 时为 None
    pub lookup: Option<CodebookLookup>,
    /// setup 阶段构建的 Huffman 查找表
    pub huffman: HuffmanLut,
}

/// 解析一个 codebook (以 'BCV' 同步字开始)
pub(crate) fn parse_codebook(bc: &mut BitCursor<'_>) -> LanResult<Codebook> {
    let sync = bc.read_bits(24)?;
    if sync != CODEBOOK_SYNC {
        return Err(LanError::InvalidSetup(format!(
            "codebook 同步字错误: 0x{sync:06X}",
        )));
    }

    let dimensions = bc.read_bits(16)? as u16;
    if dimensions == 0 {
        return Err(LanError::InvalidSetup("codebook dimensions 不能为 0".into()));
    }
    let entry_count = bc.read_bits(24)?;
    if entry_count == 0 {
        return Err(LanError::InvalidSetup("codebook entries 不能为 0".into()));
    }

    let mut entry_lengths = vec![0u8; entry_count as usize];
    let ordered = bc.read_flag()?;
    if ordered {
        // 按长度递增成段赋值
        let mut current_length = bc.read_bits(5)?;
        let mut entry_index = 0u32;
        while entry_index < entry_count {
            let bits = ilog(entry_count - entry_index);
            let run = bc.read_bits(bits)?;
            if entry_index + run > entry_count {
                return Err(LanError::InvalidSetup(
                    "codebook ordered 长度组越过条目数".into(),
                ));
            }
            if run > 0 && current_length > 32 {
                return Err(LanError::InvalidSetup(
                    "codebook ordered 码长超过 32".into(),
                ));
            }
            for length in &mut entry_lengths[entry_index as usize..(entry_index + run) as usize] {
                *length = current_length as u8;
            }
            entry_index += run;
            current_length += 1;
        }
    } else {
        let sparse = bc.read_flag()?;
        for length in &mut entry_lengths {
            let used = if sparse { bc.read_flag()? } else { true };
            if used {
                *length = bc.read_bits(5)? as u8 + 1;
            }
        }
    }

    let lookup_type = bc.read_bits(4)? as u8;
    let lookup = match lookup_type {
        0 => None,
        1 | 2 => {
            let min_value = float32_unpack(bc.read_bits(32)?);
            let delta_value = float32_unpack(bc.read_bits(32)?);
            let value_bits = bc.read_bits(4)? as u8 + 1;
            let sequence_p = bc.read_flag()?;

            let value_count = if lookup_type == 1 {
                lookup1_values(entry_count, dimensions)
            } else {
                entry_count
                    .checked_mul(u32::from(dimensions))
                    .ok_or_else(|| LanError::InvalidSetup("codebook 乘数表长度溢出".into()))?
            };
            let mut multiplicands = Vec::with_capacity(value_count as usize);
            for _ in 0..value_count {
                multiplicands.push(bc.read_bits(value_bits)?);
            }
            Some(CodebookLookup {
                lookup_type,
                min_value,
                delta_value,
                value_bits,
                sequence_p,
                multiplicands,
            })
        }
        _ => {
            return Err(LanError::InvalidSetup(format!(
                "codebook lookup_type 非法: {}",
                lookup_type,
            )));
        }
    };

    let huffman = HuffmanLut::from_lengths(&entry_lengths)?;
    Ok(Codebook {
        dimensions,
        entry_count,
        entry_lengths,
        lookup,
        huffman,
    })
}

/// Vorbis 打包浮点解码: 21 位尾数, 10 位指数 (偏置 788), 最高位符号
pub fn float32_unpack(v: u32) -> f32 {
    let mantissa = v & 0x1F_FFFF;
    let sign = v & 0x8000_0000;
    let exponent = (v & 0x7FE0_0000) >> 21;

    let value = f64::from(mantissa) * (f64::from(exponent) - 788.0).exp2();
    if sign != 0 { -value as f32 } else { value as f32 }
}

/// lookup_type=1 的乘数表长度: 满足 K^dimensions <= entry_count 的最大 K
pub fn lookup1_values(entry_count: u32, dimensions: u16) -> u32 {
    if entry_count == 0 || dimensions == 0 {
        return 0;
    }

    let mut lo = 1u32;
    let mut hi = entry_count.max(1);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if pow_le(mid, u32::from(dimensions), entry_count) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// base^exp <= limit, 以 u128 逐乘避免溢出
pub(crate) fn pow_le(base: u32, exp: u32, limit: u32) -> bool {
    let mut out = 1u128;
    let limit = u128::from(limit);
    for _ in 0..exp {
        out *= u128::from(base);
        if out > limit {
            return false;
        }
    }
    true
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lan_core::BitWriter;

    /// 写出一个非稀疏、无 lookup 的 codebook
    pub(crate) fn write_plain_codebook(bw: &mut BitWriter, dimensions: u16, lengths: &[u8]) {
        bw.write_bits(CODEBOOK_SYNC, 24);
        bw.write_bits(u32::from(dimensions), 16);
        bw.write_bits(lengths.len() as u32, 24);
        bw.write_flag(false); // ordered
        bw.write_flag(false); // sparse
        for &l in lengths {
            bw.write_bits(u32::from(l) - 1, 5);
        }
        bw.write_bits(0, 4); // lookup_type
    }

    #[test]
    fn test_ordered长度成段赋值() {
        // dimensions=1, entries=4, ordered=1, 初始长度 2, 一段覆盖全部 4 项
        let mut bw = BitWriter::new();
        bw.write_bits(CODEBOOK_SYNC, 24);
        bw.write_bits(1, 16);
        bw.write_bits(4, 24);
        bw.write_flag(true); // ordered
        bw.write_bits(2, 5); // 初始长度
        bw.write_bits(4, 3); // ilog(4)=3 位的段长
        bw.write_bits(0, 4); // lookup_type
        let data = bw.finish();

        let mut bc = BitCursor::new(&data);
        let book = parse_codebook(&mut bc).expect("解析失败");
        assert_eq!(book.entry_lengths, vec![2, 2, 2, 2]);
        // 码字应为 00, 01, 10, 11
        let mut codewords: Vec<(u32, u32)> = book
            .huffman
            .entries()
            .iter()
            .map(|e| (e.entry, e.codeword >> 30))
            .collect();
        codewords.sort();
        assert_eq!(codewords, vec![(0, 0b00), (1, 0b01), (2, 0b10), (3, 0b11)]);
    }

    #[test]
    fn test_ordered段越界报错() {
        let mut bw = BitWriter::new();
        bw.write_bits(CODEBOOK_SYNC, 24);
        bw.write_bits(1, 16);
        bw.write_bits(4, 24);
        bw.write_flag(true);
        bw.write_bits(2, 5);
        bw.write_bits(5, 3); // 段长 5 > 剩余 4
        let data = bw.finish();

        let mut bc = BitCursor::new(&data);
        assert!(matches!(
            parse_codebook(&mut bc),
            Err(LanError::InvalidSetup(_)),
        ));
    }

    #[test]
    fn test_过满码长表构建失败() {
        let mut bw = BitWriter::new();
        write_plain_codebook(&mut bw, 1, &[2, 2, 2, 2, 2]);
        let data = bw.finish();

        let mut bc = BitCursor::new(&data);
        assert!(matches!(
            parse_codebook(&mut bc),
            Err(LanError::InvalidCodebook(_)),
        ));
    }

    #[test]
    fn test_稀疏码长表() {
        let mut bw = BitWriter::new();
        bw.write_bits(CODEBOOK_SYNC, 24);
        bw.write_bits(1, 16);
        bw.write_bits(3, 24);
        bw.write_flag(false); // ordered
        bw.write_flag(true); // sparse
        bw.write_flag(true);
        bw.write_bits(0, 5); // 条目 0: 长度 1
        bw.write_flag(false); // 条目 1: 未使用
        bw.write_flag(true);
        bw.write_bits(0, 5); // 条目 2: 长度 1
        bw.write_bits(0, 4); // lookup_type
        let data = bw.finish();

        let mut bc = BitCursor::new(&data);
        let book = parse_codebook(&mut bc).expect("解析失败");
        assert_eq!(book.entry_lengths, vec![1, 0, 1]);
        assert_eq!(book.huffman.entries().len(), 2);
    }

    #[test]
    fn test_同步字错误() {
        let mut bw = BitWriter::new();
        bw.write_bits(0x123456, 24);
        let data = bw.finish();
        let mut bc = BitCursor::new(&data);
        assert!(matches!(
            parse_codebook(&mut bc),
            Err(LanError::InvalidSetup(_)),
        ));
    }

    #[test]
    fn test_lookup1配置解析() {
        // entries=9, dimensions=2 -> lookup1_values = 3
        let mut bw = BitWriter::new();
        bw.write_bits(CODEBOOK_SYNC, 24);
        bw.write_bits(2, 16);
        bw.write_bits(9, 24);
        bw.write_flag(false);
        bw.write_flag(false);
        for _ in 0..9 {
            bw.write_bits(3, 5); // 全部长度 4
        }
        bw.write_bits(1, 4); // lookup_type=1
        bw.write_bits(float32_pack(1.0), 32); // min
        bw.write_bits(float32_pack(0.5), 32); // delta
        bw.write_bits(4, 4); // value_bits = 5
        bw.write_flag(false); // sequence_p
        for v in [1u32, 2, 3] {
            bw.write_bits(v, 5);
        }
        let data = bw.finish();

        let mut bc = BitCursor::new(&data);
        let book = parse_codebook(&mut bc).expect("解析失败");
        let lookup = book.lookup.expect("应有 lookup 配置");
        assert_eq!(lookup.lookup_type, 1);
        assert_eq!(lookup.value_bits, 5);
        assert_eq!(lookup.multiplicands, vec![1, 2, 3]);
        assert!((lookup.min_value - 1.0).abs() < 1e-6);
        assert!((lookup.delta_value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_lookup_type非法() {
        let mut bw = BitWriter::new();
        bw.write_bits(CODEBOOK_SYNC, 24);
        bw.write_bits(1, 16);
        bw.write_bits(2, 24);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_bits(0, 5);
        bw.write_bits(0, 5);
        bw.write_bits(3, 4); // lookup_type=3
        let data = bw.finish();
        let mut bc = BitCursor::new(&data);
        assert!(matches!(
            parse_codebook(&mut bc),
            Err(LanError::InvalidSetup(_)),
        ));
    }

    /// 测试辅助: 把 value = mantissa * 2^(exp-788) 打包
    fn float32_pack(value: f32) -> u32 {
        // 取 mantissa = value * 2^20, exponent = 788 - 20
        let sign = if value < 0.0 { 0x8000_0000u32 } else { 0 };
        let mantissa = (value.abs() * (1u32 << 20) as f32).round() as u32;
        assert!(mantissa < (1 << 21));
        sign | ((788 - 20) << 21) | mantissa
    }

    #[test]
    fn test_float32_unpack往返律() {
        for (sign, exponent, mantissa) in [
            (0u32, 788u32, 1u32),
            (0, 788, 0x1F_FFFF),
            (1, 790, 3),
            (0, 780, 1024),
            (1, 768, 0x10_0000),
        ] {
            let packed = (sign << 31) | (exponent << 21) | mantissa;
            let expect = f64::from(mantissa)
                * (f64::from(exponent) - 788.0).exp2()
                * if sign != 0 { -1.0 } else { 1.0 };
            let got = float32_unpack(packed);
            assert!(
                (f64::from(got) - expect).abs() <= expect.abs() * 1e-6,
                "float32_unpack({:#010X}) = {}, 期望 {}",
                packed,
                got,
                expect,
            );
        }
    }

    #[test]
    fn test_lookup1_values性质() {
        for (entries, dims, expect) in [
            (1u32, 1u16, 1u32),
            (4, 1, 4),
            (4, 2, 2),
            (8, 2, 2),
            (9, 2, 3),
            (24, 3, 2),
            (27, 3, 3),
            (65536, 16, 2),
        ] {
            let k = lookup1_values(entries, dims);
            assert_eq!(k, expect, "lookup1_values({}, {})", entries, dims);
            assert!(pow_le(k, u32::from(dims), entries));
            assert!(!pow_le(k + 1, u32::from(dims), entries));
        }
    }
}
