//! 逐声道 floor 解码.
//!
//! floor1 的包内数据是一串 Huffman/定宽编码的量化 Y 值; 重建时对每个点
//! 由已解码的低/高邻点作整数 DDA 插值得到预测值, 再按残差与可用空间
//! (room) 还原最终 Y. 位预算在解码中途耗尽时该声道按"无 floor"处理,
//! 这是码流允许的正常截断, 不是错误.
//!
//! floor0 仅解析包头 (幅值与 codebook 选择), 音频域包络重建未实现.

use lan_core::{BitCursor, LanError, LanResult, ilog, stream_flags};
use log::warn;

use super::codebook::Codebook;
use super::setup::{Floor0, Floor1};

/// floor1 重建结果: 量化 Y 曲线 (按 X 坐标的原始顺序)
#[derive(Debug, Clone)]
pub struct FloorCurve {
    /// Y 值范围 (multiplier 决定)
    pub range: u32,
    /// 各点最终量化 Y 值
    pub final_ys: Vec<u32>,
    /// 各点是否参与最终曲线 (未参与的点对曲线贡献为零)
    pub used: Vec<bool>,
}

/// 解码一个声道的 floor1 数据
///
/// 返回 `None` 表示本包该声道无 floor (nonzero 位为 0, 或位预算中途耗尽),
/// 其音频输出为静音.
pub(crate) fn decode_floor1(
    bc: &mut BitCursor<'_>,
    floor: &Floor1,
    codebooks: &[Codebook],
) -> LanResult<Option<FloorCurve>> {
    match decode_floor1_inner(bc, floor, codebooks) {
        Ok(curve) => Ok(curve),
        // 包内位耗尽: 该声道按无 floor 处理
        Err(LanError::Eof) => Ok(None),
        Err(e) => Err(e),
    }
}

fn decode_floor1_inner(
    bc: &mut BitCursor<'_>,
    floor: &Floor1,
    codebooks: &[Codebook],
) -> LanResult<Option<FloorCurve>> {
    if !bc.read_flag()? {
        return Ok(None);
    }

    let range = floor.range();
    let bits = ilog(range - 1);

    let mut ys = Vec::with_capacity(floor.values.len());
    ys.push(bc.read_bits(bits)?);
    ys.push(bc.read_bits(bits)?);

    for &class_index in &floor.partition_classes {
        let class = &floor.classes[usize::from(class_index)];
        let cbits = class.subclass_logcount;
        let csub = (1u32 << cbits) - 1;

        let mut cval = 0u32;
        if cbits > 0 {
            let masterbook = class
                .masterbook
                .ok_or_else(|| LanError::Internal("floor1 masterbook 缺失".into()))?;
            cval = codebooks[usize::from(masterbook)].huffman.decode(bc)?;
        }

        for _ in 0..class.dimensions {
            let subbook = class.subclass_books[(cval & csub) as usize];
            cval >>= cbits;
            let y = match subbook {
                Some(book) => codebooks[usize::from(book)].huffman.decode(bc)?,
                None => 0,
            };
            ys.push(y);
        }
    }

    Ok(Some(synthesize_amplitude(floor, range, &ys)?))
}

/// 幅值合成: 从量化残差 ys 重建最终 Y 曲线与参与标志
fn synthesize_amplitude(floor: &Floor1, range: u32, ys: &[u32]) -> LanResult<FloorCurve> {
    let xs = &floor.values;
    let n = ys.len();

    let mut used = vec![false; n];
    let mut final_ys = vec![0u32; n];
    used[0] = true;
    used[1] = true;
    final_ys[0] = ys[0];
    final_ys[1] = ys[1];

    for i in 2..n {
        let ln = low_neighbour(xs, i)
            .ok_or_else(|| LanError::Internal("floor1 低邻点缺失".into()))?;
        let hn = high_neighbour(xs, i)
            .ok_or_else(|| LanError::Internal("floor1 高邻点缺失".into()))?;

        let predicted =
            i64::from(render_point(xs[ln], final_ys[ln], xs[hn], final_ys[hn], xs[i]));
        let val = i64::from(ys[i]);

        let highroom = i64::from(range) - predicted;
        let lowroom = predicted;
        let room = highroom.min(lowroom) * 2;

        if val != 0 {
            used[ln] = true;
            used[hn] = true;
            used[i] = true;
            let y = if val >= room {
                if highroom > lowroom {
                    predicted + (val - lowroom)
                } else {
                    predicted - (val - highroom) - 1
                }
            } else if val & 1 != 0 {
                predicted - (val + 1) / 2
            } else {
                predicted + val / 2
            };
            final_ys[i] = y.clamp(0, i64::from(range) - 1) as u32;
        } else {
            used[i] = false;
            final_ys[i] = predicted.clamp(0, i64::from(range) - 1) as u32;
        }
    }

    Ok(FloorCurve {
        range,
        final_ys,
        used,
    })
}

/// 解码一个声道的 floor0 包头
///
/// 返回 `Some(amplitude)` 表示包头有效; `None` 表示幅值为 0, 声道静音.
/// 音频域包络重建未实现, 调用方只得到幅值.
pub(crate) fn decode_floor0_head(
    bc: &mut BitCursor<'_>,
    floor: &Floor0,
    codebook_count: usize,
) -> LanResult<Option<u32>> {
    let map_eop = |e: LanError| match e {
        LanError::Eof => LanError::InvalidStream(stream_flags::END_OF_PACKET),
        other => other,
    };

    let amplitude = bc.read_bits(floor.amplitude_bits).map_err(map_eop)?;
    if amplitude == 0 {
        return Ok(None);
    }

    let book_bits = ilog(floor.books.len() as u32);
    let book_index = bc.read_bits(book_bits).map_err(map_eop)?;
    if book_index as usize >= codebook_count {
        return Err(LanError::InvalidStream(stream_flags::UNDECODABLE_PACKET));
    }

    warn!("Vorbis floor0 包头已解析 (amplitude={}), 音频域重建未实现", amplitude);
    Ok(Some(amplitude))
}

/// i 之前 X 值小于 X[i] 的点中 X 最大者
fn low_neighbour(xs: &[u32], i: usize) -> Option<usize> {
    let mut n: Option<usize> = None;
    for j in 0..i {
        if xs[j] < xs[i] && n.is_none_or(|k| xs[j] > xs[k]) {
            n = Some(j);
        }
    }
    n
}

/// i 之前 X 值大于 X[i] 的点中 X 最小者
fn high_neighbour(xs: &[u32], i: usize) -> Option<usize> {
    let mut n: Option<usize> = None;
    for j in 0..i {
        if xs[j] > xs[i] && n.is_none_or(|k| xs[j] < xs[k]) {
            n = Some(j);
        }
    }
    n
}

/// (x0,y0)-(x1,y1) 整数 DDA 直线在 x 处的取值, 截断到非负
pub(crate) fn render_point(x0: u32, y0: u32, x1: u32, y1: u32, x: u32) -> u32 {
    let dy = i64::from(y1) - i64::from(y0);
    let adx = i64::from(x1) - i64::from(x0);
    let ady = dy.abs();
    let err = ady * (i64::from(x) - i64::from(x0));
    let off = err / adx;
    if dy < 0 {
        (i64::from(y0) - off).max(0) as u32
    } else {
        (i64::from(y0) + off) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vorbis::huffman::HuffmanLut;
    use crate::vorbis::setup::Floor1Class;
    use lan_core::BitWriter;

    fn book_11() -> Codebook {
        Codebook {
            dimensions: 1,
            entry_count: 2,
            entry_lengths: vec![1, 1],
            lookup: None,
            huffman: HuffmanLut::from_lengths(&[1, 1]).expect("构建失败"),
        }
    }

    /// X=[0,128,32,96], 单分区, 类 0: dims=2, 无子类选择, 子类书 -> book 1
    fn test_floor() -> Floor1 {
        Floor1 {
            partition_classes: vec![0],
            classes: vec![Floor1Class {
                dimensions: 2,
                subclass_logcount: 0,
                masterbook: None,
                subclass_books: vec![Some(1)],
            }],
            multiplier: 1,
            range_bits: 7,
            values: vec![0, 128, 32, 96],
        }
    }

    #[test]
    fn test_render_point直线() {
        assert_eq!(render_point(0, 0, 10, 10, 5), 5);
        assert_eq!(render_point(0, 10, 10, 0, 5), 5);
        assert_eq!(render_point(0, 30, 128, 25, 32), 29);
        assert_eq!(render_point(32, 28, 128, 25, 96), 26);
        // 端点处取 y0
        assert_eq!(render_point(4, 7, 12, 100, 4), 7);
        assert_eq!(render_point(0, 3, 4, 0, 4), 0);
    }

    #[test]
    fn test_邻点搜索() {
        let xs = [0u32, 256, 128, 64, 192];
        assert_eq!(low_neighbour(&xs, 2), Some(0));
        assert_eq!(high_neighbour(&xs, 2), Some(1));
        assert_eq!(low_neighbour(&xs, 3), Some(0));
        assert_eq!(high_neighbour(&xs, 3), Some(2));
        assert_eq!(low_neighbour(&xs, 4), Some(2));
        assert_eq!(high_neighbour(&xs, 4), Some(1));
        assert_eq!(low_neighbour(&xs, 1), Some(0));
        assert_eq!(high_neighbour(&xs, 1), None);
    }

    #[test]
    fn test_floor1解码与幅值合成() {
        let codebooks = vec![book_11(), book_11()];
        let floor = test_floor();

        // nonzero=1, y0=30, y1=25 (各 8 位), 两个 1 位 Huffman Y: 1, 0
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.write_bits(30, 8);
        bw.write_bits(25, 8);
        bw.write_bit(1); // Y2 = entry 1
        bw.write_bit(0); // Y3 = entry 0
        let data = bw.finish();

        let mut bc = BitCursor::new(&data);
        let curve = decode_floor1(&mut bc, &floor, &codebooks)
            .expect("解码失败")
            .expect("应有曲线");

        assert_eq!(curve.range, 256);
        // X=32: 预测 29, 残差 1 (奇) -> 29 - 1 = 28
        // X=96: 预测 26, 残差 0 -> 未参与, 取预测值
        assert_eq!(curve.final_ys, vec![30, 25, 28, 26]);
        assert_eq!(curve.used, vec![true, true, true, false]);
    }

    #[test]
    fn test_nonzero为零声道静音() {
        let codebooks = vec![book_11(), book_11()];
        let floor = test_floor();
        let data = [0u8];
        let mut bc = BitCursor::new(&data);
        let out = decode_floor1(&mut bc, &floor, &codebooks).expect("解码失败");
        assert!(out.is_none());
        assert_eq!(bc.bit_position(), 1);
    }

    #[test]
    fn test_位预算耗尽声道静音() {
        let codebooks = vec![book_11(), book_11()];
        let floor = test_floor();
        // 只有 nonzero 位与半个 y0
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.write_bits(30, 4);
        let data = bw.finish();
        // 缩短到 5 位可见
        let mut bc = BitCursor::new(&data[..1]);
        let out = decode_floor1(&mut bc, &floor, &codebooks).expect("应按静音处理");
        assert!(out.is_none());
    }

    #[test]
    fn test_残差大于room的折返() {
        // 单点手工验证 val >= room 的两个分支
        let floor = Floor1 {
            partition_classes: vec![0],
            classes: vec![Floor1Class {
                dimensions: 1,
                subclass_logcount: 0,
                masterbook: None,
                subclass_books: vec![None],
            }],
            multiplier: 4, // range = 64
            range_bits: 6,
            values: vec![0, 64, 16],
        };
        // ys 直接喂给合成: y0=2, y1=6, y2=20
        // 预测 = render(0,2,64,6,16) = 2 + (4*16)/64 = 3
        // highroom = 61, lowroom = 3, room = 6; val=20 >= 6, highroom > lowroom
        // -> 3 + (20 - 3) = 20
        let curve = synthesize_amplitude(&floor, 64, &[2, 6, 20]).expect("合成失败");
        assert_eq!(curve.final_ys, vec![2, 6, 20]);
        assert_eq!(curve.used, vec![true, true, true]);

        // y0=60, y1=58: 预测 = render(0,60,64,58,16) = 60 - (2*16)/64 = 60
        // highroom = 4, lowroom = 60, room = 8; val=20 >= 8, highroom <= lowroom
        // -> 60 - (20 - 4) - 1 = 43
        let curve = synthesize_amplitude(&floor, 64, &[60, 58, 20]).expect("合成失败");
        assert_eq!(curve.final_ys[2], 43);
    }

    #[test]
    fn test_floor0包头() {
        let floor = Floor0 {
            order: 8,
            rate: 44100,
            bark_map_size: 256,
            amplitude_bits: 6,
            amplitude_offset: 0,
            books: vec![0],
        };

        // amplitude = 0 -> 静音
        let mut bw = BitWriter::new();
        bw.write_bits(0, 6);
        let data = bw.finish();
        let mut bc = BitCursor::new(&data);
        assert!(decode_floor0_head(&mut bc, &floor, 1).unwrap().is_none());

        // amplitude != 0, book 索引合法
        let mut bw = BitWriter::new();
        bw.write_bits(33, 6);
        bw.write_bits(0, 1); // ilog(1) = 1 位
        let data = bw.finish();
        let mut bc = BitCursor::new(&data);
        assert_eq!(decode_floor0_head(&mut bc, &floor, 1).unwrap(), Some(33));

        // book 索引越界
        let mut bw = BitWriter::new();
        bw.write_bits(33, 6);
        bw.write_bits(1, 1);
        let data = bw.finish();
        let mut bc = BitCursor::new(&data);
        assert!(matches!(
            decode_floor0_head(&mut bc, &floor, 1),
            Err(LanError::InvalidStream(f)) if f == stream_flags::UNDECODABLE_PACKET,
        ));

        // 位预算不足 -> END_OF_PACKET
        let data = [0u8];
        let mut bc = BitCursor::new(&data);
        bc.read_bits(5).unwrap();
        assert!(matches!(
            decode_floor0_head(&mut bc, &floor, 1),
            Err(LanError::InvalidStream(f)) if f == stream_flags::END_OF_PACKET,
        ));
    }
}
