//! Vorbis 窗形推导与求值.
//!
//! 每个音频包的窗由块长与前后窗标志决定: 长块与短块衔接时,
//! 对应一侧的斜坡收窄为短块宽度并居中于 1/4 或 3/4 处.
//! 窗形为 Vorbis 规范的 sin(π/2·sin²) 曲线, 右斜坡相位偏移 π/2.

use std::f32::consts::FRAC_PI_2;

/// 一个音频包的窗参数 (区间均为半开 [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    /// 本包块长
    pub blocksize: u32,
    /// 左斜坡起点
    pub left_start: u32,
    /// 左斜坡终点
    pub left_end: u32,
    /// 右斜坡起点
    pub right_start: u32,
    /// 右斜坡终点
    pub right_end: u32,
}

/// 由块长与窗标志推导窗边界
///
/// `short_blocksize` 为 1 << blocksize_0; 短块 (blockflag=0) 的窗铺满整块,
/// 长块相邻短块的一侧斜坡收窄为短块宽度.
pub fn derive_window(
    blocksize: u32,
    short_blocksize: u32,
    blockflag: bool,
    prev_window_flag: bool,
    next_window_flag: bool,
) -> WindowParams {
    let center = blocksize / 2;

    let (left_start, left_end) = if blockflag && !prev_window_flag {
        (
            blocksize / 4 - short_blocksize / 4,
            blocksize / 4 + short_blocksize / 4,
        )
    } else {
        (0, center)
    };

    let (right_start, right_end) = if blockflag && !next_window_flag {
        (
            blocksize * 3 / 4 - short_blocksize / 4,
            blocksize * 3 / 4 + short_blocksize / 4,
        )
    } else {
        (center, blocksize)
    };

    WindowParams {
        blocksize,
        left_start,
        left_end,
        right_start,
        right_end,
    }
}

/// 求位置 n 处的窗值: 斜坡间为 1, 斜坡外为 0
pub fn window_eval(n: u32, w: &WindowParams) -> f32 {
    if n >= w.right_end {
        return 0.0;
    }
    if n >= w.right_start {
        let t0 = (((n - w.right_start) as f32 + 0.5) / (w.right_end - w.right_start) as f32
            * FRAC_PI_2
            + FRAC_PI_2)
            .sin();
        return (FRAC_PI_2 * t0 * t0).sin();
    }
    if n >= w.left_end {
        return 1.0;
    }
    if n >= w.left_start {
        let t0 = (((n - w.left_start) as f32 + 0.5) / (w.left_end - w.left_start) as f32
            * FRAC_PI_2)
            .sin();
        return (FRAC_PI_2 * t0 * t0).sin();
    }
    0.0
}
