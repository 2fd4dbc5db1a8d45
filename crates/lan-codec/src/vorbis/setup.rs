//! Vorbis setup 头包解析.
//!
//! setup 头在 7 字节标识后依次携带 codebooks、time 占位、floors、residues、
//! mappings、modes 六段配置, 最后以 1 个为真的 framing 位收尾.
//! 所有表都被完整存储, 供音频包解码阶段按索引引用; 每个引用字段在
//! 解析时即做范围校验.
//!
//! 位预算不足一律映射为 [`LanError::IncompleteHeader`], 语义违例为
//! [`LanError::InvalidSetup`].

use lan_core::{BitCursor, LanError, LanResult, ilog};
use log::debug;

use super::codebook::{Codebook, parse_codebook, pow_le};

/// 解析完成的 setup 头
#[derive(Debug, Clone)]
pub struct SetupHeader {
    /// codebook 表
    pub codebooks: Vec<Codebook>,
    /// floor 配置表
    pub floors: Vec<Floor>,
    /// residue 配置表
    pub residues: Vec<Residue>,
    /// mapping 配置表
    pub mappings: Vec<Mapping>,
    /// mode 配置表
    pub modes: Vec<Mode>,
}

/// floor 配置 (按 type 区分的和类型)
#[derive(Debug, Clone)]
pub enum Floor {
    /// type 0: LSP 包络 (语法解析, 音频域重建未实现)
    Type0(Floor0),
    /// type 1: 分段线性包络
    Type1(Floor1),
}

/// floor type 0 配置
#[derive(Debug, Clone)]
pub struct Floor0 {
    /// LPC 阶数
    pub order: u8,
    /// 合成采样率
    pub rate: u16,
    /// bark 映射表长
    pub bark_map_size: u16,
    /// 幅值位宽
    pub amplitude_bits: u8,
    /// 幅值偏移
    pub amplitude_offset: u8,
    /// 系数 codebook 索引表
    pub books: Vec<u8>,
}

/// floor type 1 的类配置
#[derive(Debug, Clone)]
pub struct Floor1Class {
    /// 本类在每个分区贡献的 X 点数
    pub dimensions: u8,
    /// 子类数的对数 (0..=3)
    pub subclass_logcount: u8,
    /// 子类选择 codebook, 仅 subclass_logcount > 0 时存在
    pub masterbook: Option<u8>,
    /// 子类 codebook 表, None 表示该子类无码本 (Y 取 0)
    pub subclass_books: Vec<Option<u8>>,
}

/// floor type 1 配置
#[derive(Debug, Clone)]
pub struct Floor1 {
    /// 各分区的类索引
    pub partition_classes: Vec<u8>,
    /// 类配置表
    pub classes: Vec<Floor1Class>,
    /// Y 值量化因子 (1..=4)
    pub multiplier: u8,
    /// X 坐标位宽
    pub range_bits: u8,
    /// X 坐标表, 前两项固定为 0 与 1 << range_bits
    pub values: Vec<u32>,
}

impl Floor1 {
    /// multiplier 对应的 Y 值范围
    pub fn range(&self) -> u32 {
        [256, 128, 86, 64][usize::from(self.multiplier - 1)]
    }
}

/// residue 配置
#[derive(Debug, Clone)]
pub struct Residue {
    /// residue 类型 (0..=2)
    pub residue_type: u16,
    /// 解码区间起点
    pub begin: u32,
    /// 解码区间终点
    pub end: u32,
    /// 分区大小
    pub partition_size: u32,
    /// 分类数
    pub classif_count: u8,
    /// 分类 codebook 索引
    pub classbook: u8,
    /// 每个分类的级联位图 (8 个 stage)
    pub cascades: Vec<u8>,
    /// 每个分类各 stage 的 codebook, None 表示该 stage 未使用
    pub books: Vec<[Option<u8>; 8]>,
}

/// 声道耦合步骤
#[derive(Debug, Clone, Copy)]
pub struct CouplingStep {
    /// 幅度声道
    pub magnitude: u8,
    /// 角度声道
    pub angle: u8,
}

/// mapping 配置
#[derive(Debug, Clone)]
pub struct Mapping {
    /// submap 数 (1..=16)
    pub submap_count: u8,
    /// 耦合步骤表
    pub coupling_steps: Vec<CouplingStep>,
    /// 每声道的 submap 选择
    pub channel_mux: Vec<u8>,
    /// 每 submap 的 floor 索引
    pub submap_floors: Vec<u8>,
    /// 每 submap 的 residue 索引
    pub submap_residues: Vec<u8>,
}

/// mode 配置
#[derive(Debug, Clone, Copy)]
pub struct Mode {
    /// 块长选择: false=blocksize_0, true=blocksize_1
    pub blockflag: bool,
    /// mapping 索引
    pub mapping: u8,
}

/// 位预算不足在头包上下文中一律是 IncompleteHeader
fn map_eof(e: LanError) -> LanError {
    match e {
        LanError::Eof => LanError::IncompleteHeader,
        other => other,
    }
}

/// 解析 setup 头包 (含 `\x05vorbis` 标识)
pub fn parse_setup_packet(packet: &[u8], audio_channels: u8) -> LanResult<SetupHeader> {
    if packet.len() < 7 || packet[0] != 0x05 || &packet[1..7] != b"vorbis" {
        return Err(LanError::MissingHeader);
    }

    let mut bc = BitCursor::new(&packet[7..]);

    let codebooks = parse_codebooks(&mut bc).map_err(map_eof)?;
    debug!(
        "Vorbis setup: {} 个 codebook 解析完成 (bit={})",
        codebooks.len(),
        bc.bit_position(),
    );
    parse_time_placeholders(&mut bc).map_err(map_eof)?;
    let floors = parse_floors(&mut bc, &codebooks).map_err(map_eof)?;
    let residues = parse_residues(&mut bc, &codebooks).map_err(map_eof)?;
    let mappings = parse_mappings(
        &mut bc,
        audio_channels,
        floors.len() as u32,
        residues.len() as u32,
    )
    .map_err(map_eof)?;
    let modes = parse_modes(&mut bc, mappings.len() as u32).map_err(map_eof)?;

    let framing = bc.read_flag().map_err(map_eof)?;
    if !framing {
        return Err(LanError::InvalidSetup("framing 位非法".into()));
    }

    debug!(
        "Vorbis setup: floors={}, residues={}, mappings={}, modes={}",
        floors.len(),
        residues.len(),
        mappings.len(),
        modes.len(),
    );

    Ok(SetupHeader {
        codebooks,
        floors,
        residues,
        mappings,
        modes,
    })
}

fn parse_codebooks(bc: &mut BitCursor<'_>) -> LanResult<Vec<Codebook>> {
    let count = bc.read_bits(8)? + 1;
    let mut codebooks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        codebooks.push(parse_codebook(bc)?);
    }
    Ok(codebooks)
}

fn parse_time_placeholders(bc: &mut BitCursor<'_>) -> LanResult<()> {
    let count = bc.read_bits(6)? + 1;
    for _ in 0..count {
        let value = bc.read_bits(16)?;
        if value != 0 {
            return Err(LanError::InvalidSetup(format!(
                "time 占位必须为 0, 实际 {}",
                value,
            )));
        }
    }
    Ok(())
}

fn parse_floors(bc: &mut BitCursor<'_>, codebooks: &[Codebook]) -> LanResult<Vec<Floor>> {
    let count = bc.read_bits(6)? + 1;
    let mut floors = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let floor_type = bc.read_bits(16)?;
        match floor_type {
            0 => floors.push(Floor::Type0(parse_floor0(bc, codebooks)?)),
            1 => floors.push(Floor::Type1(parse_floor1(bc, codebooks)?)),
            _ => {
                return Err(LanError::InvalidSetup(format!(
                    "floor 类型不支持: {}",
                    floor_type,
                )));
            }
        }
    }
    Ok(floors)
}

fn parse_floor0(bc: &mut BitCursor<'_>, codebooks: &[Codebook]) -> LanResult<Floor0> {
    let order = bc.read_bits(8)? as u8;
    let rate = bc.read_bits(16)? as u16;
    let bark_map_size = bc.read_bits(16)? as u16;
    let amplitude_bits = bc.read_bits(6)? as u8;
    let amplitude_offset = bc.read_bits(8)? as u8;
    let book_count = bc.read_bits(4)? + 1;

    let mut books = Vec::with_capacity(book_count as usize);
    for _ in 0..book_count {
        let book = bc.read_bits(8)? as u8;
        if usize::from(book) >= codebooks.len() {
            return Err(LanError::InvalidSetup(format!(
                "floor0 codebook 索引越界: {}",
                book,
            )));
        }
        books.push(book);
    }

    Ok(Floor0 {
        order,
        rate,
        bark_map_size,
        amplitude_bits,
        amplitude_offset,
        books,
    })
}

fn parse_floor1(bc: &mut BitCursor<'_>, codebooks: &[Codebook]) -> LanResult<Floor1> {
    let partition_count = bc.read_bits(5)?;
    let mut partition_classes = Vec::with_capacity(partition_count as usize);
    let mut maximum_class = -1i32;
    for _ in 0..partition_count {
        let class = bc.read_bits(4)? as u8;
        maximum_class = maximum_class.max(i32::from(class));
        partition_classes.push(class);
    }

    let class_count = (maximum_class + 1) as usize;
    let mut classes = Vec::with_capacity(class_count);
    for _ in 0..class_count {
        let dimensions = bc.read_bits(3)? as u8 + 1;
        let subclass_logcount = bc.read_bits(2)? as u8;

        // masterbook 仅在存在子类选择时出现
        let masterbook = if subclass_logcount > 0 {
            let book = bc.read_bits(8)? as u8;
            if usize::from(book) >= codebooks.len() {
                return Err(LanError::InvalidSetup(format!(
                    "floor1 masterbook 索引越界: {}",
                    book,
                )));
            }
            Some(book)
        } else {
            None
        };

        let subclass_count = 1usize << subclass_logcount;
        let mut subclass_books = Vec::with_capacity(subclass_count);
        for _ in 0..subclass_count {
            // 读出值减一; 0 表示该子类无码本
            let raw = bc.read_bits(8)?;
            let book = if raw == 0 {
                None
            } else {
                let book = (raw - 1) as u8;
                if usize::from(book) >= codebooks.len() {
                    return Err(LanError::InvalidSetup(format!(
                        "floor1 子类 codebook 索引越界: {}",
                        book,
                    )));
                }
                Some(book)
            };
            subclass_books.push(book);
        }

        classes.push(Floor1Class {
            dimensions,
            subclass_logcount,
            masterbook,
            subclass_books,
        });
    }

    let multiplier = bc.read_bits(2)? as u8 + 1;
    let range_bits = bc.read_bits(4)? as u8;

    let mut value_count = 2usize;
    for &class in &partition_classes {
        value_count += usize::from(classes[usize::from(class)].dimensions);
    }
    if value_count > 65 {
        return Err(LanError::InvalidSetup(format!(
            "floor1 X 坐标数超限: {}",
            value_count,
        )));
    }

    let mut values = Vec::with_capacity(value_count);
    values.push(0);
    values.push(1u32 << range_bits);
    for &class in &partition_classes {
        for _ in 0..classes[usize::from(class)].dimensions {
            values.push(bc.read_bits(range_bits)?);
        }
    }

    // X 坐标必须两两不同
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            if values[i] == values[j] {
                return Err(LanError::InvalidSetup(format!(
                    "floor1 X 坐标重复: {}",
                    values[i],
                )));
            }
        }
    }

    Ok(Floor1 {
        partition_classes,
        classes,
        multiplier,
        range_bits,
        values,
    })
}

fn parse_residues(bc: &mut BitCursor<'_>, codebooks: &[Codebook]) -> LanResult<Vec<Residue>> {
    let count = bc.read_bits(6)? + 1;
    let mut residues = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let residue_type = bc.read_bits(16)? as u16;
        if residue_type > 2 {
            return Err(LanError::InvalidSetup(format!(
                "residue 类型不支持: {}",
                residue_type,
            )));
        }

        let begin = bc.read_bits(24)?;
        let end = bc.read_bits(24)?;
        let partition_size = bc.read_bits(24)? + 1;
        let classif_count = bc.read_bits(6)? as u8 + 1;
        let classbook = bc.read_bits(8)? as u8;

        let book = codebooks
            .get(usize::from(classbook))
            .ok_or_else(|| LanError::InvalidSetup(format!("residue classbook 越界: {}", classbook)))?;
        // classbook 必须足以编码全部分类组合
        if !pow_le(
            u32::from(classif_count),
            u32::from(book.dimensions),
            book.entry_count,
        ) {
            return Err(LanError::InvalidSetup(format!(
                "residue classbook 容量不足: {}^{} > {}",
                classif_count, book.dimensions, book.entry_count,
            )));
        }

        let mut cascades = Vec::with_capacity(usize::from(classif_count));
        for _ in 0..classif_count {
            let low = bc.read_bits(3)?;
            let high = if bc.read_flag()? { bc.read_bits(5)? } else { 0 };
            cascades.push(((high << 3) | low) as u8);
        }

        let mut books = Vec::with_capacity(usize::from(classif_count));
        for &cascade in &cascades {
            let mut stage_books = [None; 8];
            for (stage, slot) in stage_books.iter_mut().enumerate() {
                if cascade & (1 << stage) != 0 {
                    let book = bc.read_bits(8)? as u8;
                    if usize::from(book) >= codebooks.len() {
                        return Err(LanError::InvalidSetup(format!(
                            "residue stage codebook 越界: {}",
                            book,
                        )));
                    }
                    *slot = Some(book);
                }
            }
            books.push(stage_books);
        }

        residues.push(Residue {
            residue_type,
            begin,
            end,
            partition_size,
            classif_count,
            classbook,
            cascades,
            books,
        });
    }
    Ok(residues)
}

fn parse_mappings(
    bc: &mut BitCursor<'_>,
    audio_channels: u8,
    floor_count: u32,
    residue_count: u32,
) -> LanResult<Vec<Mapping>> {
    let count = bc.read_bits(6)? + 1;
    let mut mappings = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mapping_type = bc.read_bits(16)?;
        if mapping_type != 0 {
            return Err(LanError::InvalidSetup(format!(
                "mapping 类型不支持: {}",
                mapping_type,
            )));
        }

        let submap_count = if bc.read_flag()? {
            bc.read_bits(4)? as u8 + 1
        } else {
            1
        };

        let mut coupling_steps = Vec::new();
        if bc.read_flag()? {
            let step_count = bc.read_bits(8)? + 1;
            let ch_bits = ilog(u32::from(audio_channels) - 1);
            for _ in 0..step_count {
                let magnitude = bc.read_bits(ch_bits)?;
                let angle = bc.read_bits(ch_bits)?;
                if magnitude == angle
                    || magnitude >= u32::from(audio_channels)
                    || angle >= u32::from(audio_channels)
                {
                    return Err(LanError::InvalidSetup(format!(
                        "coupling 声道对非法: magnitude={}, angle={}",
                        magnitude, angle,
                    )));
                }
                coupling_steps.push(CouplingStep {
                    magnitude: magnitude as u8,
                    angle: angle as u8,
                });
            }
        }

        let reserved = bc.read_bits(2)?;
        if reserved != 0 {
            return Err(LanError::InvalidSetup("mapping 保留位必须为 0".into()));
        }

        // 单 submap 时不读 mux, 全部声道归入 submap 0
        let mut channel_mux = vec![0u8; usize::from(audio_channels)];
        if submap_count > 1 {
            for mux in &mut channel_mux {
                let value = bc.read_bits(4)? as u8;
                if value >= submap_count {
                    return Err(LanError::InvalidSetup(format!(
                        "mapping mux 越界: {}",
                        value,
                    )));
                }
                *mux = value;
            }
        }

        let mut submap_floors = Vec::with_capacity(usize::from(submap_count));
        let mut submap_residues = Vec::with_capacity(usize::from(submap_count));
        for _ in 0..submap_count {
            let _discarded = bc.read_bits(8)?;
            let floor = bc.read_bits(8)?;
            if floor >= floor_count {
                return Err(LanError::InvalidSetup(format!(
                    "mapping floor 索引越界: {}",
                    floor,
                )));
            }
            submap_floors.push(floor as u8);

            let residue = bc.read_bits(8)?;
            if residue >= residue_count {
                return Err(LanError::InvalidSetup(format!(
                    "mapping residue 索引越界: {}",
                    residue,
                )));
            }
            submap_residues.push(residue as u8);
        }

        mappings.push(Mapping {
            submap_count,
            coupling_steps,
            channel_mux,
            submap_floors,
            submap_residues,
        });
    }
    Ok(mappings)
}

fn parse_modes(bc: &mut BitCursor<'_>, mapping_count: u32) -> LanResult<Vec<Mode>> {
    let count = bc.read_bits(6)? + 1;
    let mut modes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let blockflag = bc.read_flag()?;
        let window_type = bc.read_bits(16)?;
        let transform_type = bc.read_bits(16)?;
        if window_type != 0 || transform_type != 0 {
            return Err(LanError::InvalidSetup(
                "mode window/transform 类型必须为 0".into(),
            ));
        }

        let mapping = bc.read_bits(8)?;
        if mapping >= mapping_count {
            return Err(LanError::InvalidSetup(format!(
                "mode mapping 索引越界: {}",
                mapping,
            )));
        }

        modes.push(Mode {
            blockflag,
            mapping: mapping as u8,
        });
    }
    Ok(modes)
}
