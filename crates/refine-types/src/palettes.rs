//! Built-in retro palette registry.
//!
//! Constants follow the published tables for each machine; the quantizer
//! treats them bit-exactly.

use crate::options::ReduceColorMode;

pub const MONO: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];

/// Original DMG green ramp, dark to light.
pub const GB_LEGACY: [[u8; 3]; 4] = [
    [15, 56, 15],
    [48, 98, 48],
    [139, 172, 15],
    [155, 188, 15],
];

/// Pocket reflective-screen grays, dark to light.
pub const GB_POCKET: [[u8; 3]; 4] = [
    [31, 31, 31],
    [77, 83, 60],
    [139, 149, 109],
    [196, 207, 161],
];

/// Backlit Light teal ramp, dark to light.
pub const GB_LIGHT: [[u8; 3]; 4] = [
    [0, 68, 64],
    [0, 109, 98],
    [0, 155, 138],
    [0, 200, 176],
];

pub const PICO8: [[u8; 3]; 16] = [
    [0, 0, 0],
    [29, 43, 83],
    [126, 37, 83],
    [0, 135, 81],
    [171, 82, 54],
    [95, 87, 79],
    [194, 195, 199],
    [255, 241, 232],
    [255, 0, 77],
    [255, 163, 0],
    [255, 236, 39],
    [0, 228, 54],
    [41, 173, 255],
    [131, 118, 156],
    [255, 119, 168],
    [255, 204, 170],
];

/// 2C02 composite palette, entries 0x00..0x3F.
pub const NES: [[u8; 3]; 64] = [
    [84, 84, 84],
    [0, 30, 116],
    [8, 16, 144],
    [48, 0, 136],
    [68, 0, 100],
    [92, 0, 48],
    [84, 4, 0],
    [60, 24, 0],
    [32, 42, 0],
    [8, 58, 0],
    [0, 64, 0],
    [0, 60, 0],
    [0, 50, 60],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [152, 150, 152],
    [8, 76, 196],
    [48, 50, 236],
    [92, 30, 228],
    [136, 20, 176],
    [160, 20, 100],
    [152, 34, 32],
    [120, 60, 0],
    [84, 90, 0],
    [40, 114, 0],
    [8, 124, 0],
    [0, 118, 40],
    [0, 102, 120],
    [0, 0, 0],
    [0, 0, 0],
    [0, 0, 0],
    [236, 238, 236],
    [76, 154, 236],
    [120, 124, 236],
    [176, 98, 236],
    [228, 84, 236],
    [236, 88, 180],
    [236, 106, 100],
    [212, 136, 32],
    [160, 170, 0],
    [116, 196, 0],
    [76, 208, 32],
    [56, 204, 108],
    [56, 180, 204],
    [60, 60, 60],
    [0, 0, 0],
    [0, 0, 0],
    [236, 238, 236],
    [168, 204, 236],
    [188, 188, 236],
    [212, 178, 236],
    [236, 174, 236],
    [236, 174, 212],
    [236, 180, 176],
    [228, 196, 144],
    [204, 210, 120],
    [180, 222, 120],
    [168, 226, 144],
    [152, 226, 180],
    [160, 214, 228],
    [160, 162, 160],
    [0, 0, 0],
    [0, 0, 0],
];

/// Digital 16-color set: 8 primaries plus half-intensity variants.
pub const PC98: [[u8; 3]; 16] = [
    [0, 0, 0],
    [0, 0, 127],
    [127, 0, 0],
    [127, 0, 127],
    [0, 127, 0],
    [0, 127, 127],
    [127, 127, 0],
    [127, 127, 127],
    [64, 64, 64],
    [0, 0, 255],
    [255, 0, 0],
    [255, 0, 255],
    [0, 255, 0],
    [0, 255, 255],
    [255, 255, 0],
    [255, 255, 255],
];

/// TMS9918 colors 1..15 (transparent excluded).
pub const MSX: [[u8; 3]; 15] = [
    [0, 0, 0],
    [33, 200, 66],
    [94, 220, 120],
    [84, 85, 237],
    [125, 118, 252],
    [212, 82, 77],
    [66, 235, 245],
    [252, 85, 84],
    [255, 121, 120],
    [212, 193, 84],
    [230, 206, 128],
    [33, 176, 59],
    [201, 91, 186],
    [204, 204, 204],
    [255, 255, 255],
];

pub const C64: [[u8; 3]; 16] = [
    [0, 0, 0],
    [255, 255, 255],
    [136, 0, 0],
    [170, 255, 238],
    [204, 68, 204],
    [0, 204, 85],
    [0, 0, 170],
    [238, 238, 119],
    [221, 136, 85],
    [102, 68, 0],
    [255, 119, 119],
    [51, 51, 51],
    [119, 119, 119],
    [170, 255, 102],
    [0, 136, 255],
    [187, 187, 187],
];

pub const ARNE16: [[u8; 3]; 16] = [
    [0, 0, 0],
    [157, 157, 157],
    [255, 255, 255],
    [190, 38, 51],
    [224, 111, 139],
    [73, 60, 43],
    [164, 100, 34],
    [235, 137, 49],
    [247, 226, 107],
    [47, 72, 78],
    [68, 137, 26],
    [163, 206, 39],
    [27, 38, 50],
    [0, 87, 132],
    [49, 162, 242],
    [178, 220, 239],
];

/// Fixed palette for a mode, or `None` for the non-registry modes
/// (`none`, `auto`, `fixed` and the SFC K-means modes).
pub fn lookup(mode: ReduceColorMode) -> Option<&'static [[u8; 3]]> {
    match mode {
        ReduceColorMode::Mono => Some(&MONO),
        ReduceColorMode::GbLegacy => Some(&GB_LEGACY),
        ReduceColorMode::GbPocket => Some(&GB_POCKET),
        ReduceColorMode::GbLight => Some(&GB_LIGHT),
        ReduceColorMode::Pico8 => Some(&PICO8),
        ReduceColorMode::Nes => Some(&NES),
        ReduceColorMode::Pc98 => Some(&PC98),
        ReduceColorMode::Msx => Some(&MSX),
        ReduceColorMode::C64 => Some(&C64),
        ReduceColorMode::Arne16 => Some(&ARNE16),
        ReduceColorMode::None
        | ReduceColorMode::Auto
        | ReduceColorMode::Fixed
        | ReduceColorMode::SfcSprite
        | ReduceColorMode::SfcBg => None,
    }
}
