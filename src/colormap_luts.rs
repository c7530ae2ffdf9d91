//! Evenly spaced color anchors for the built-in colormaps.
//!
//! Anchor `i` of an `n`-entry table sits at `t = i / (n - 1)`; values in
//! between are linearly interpolated by [`crate::colormap::Colormap::map`].

/// Moreland's smooth cool-warm diverging map
pub const COOLWARM_ANCHORS: [[u8; 3]; 33] = [
    [59, 76, 192],
    [68, 90, 204],
    [77, 104, 215],
    [87, 117, 225],
    [98, 130, 234],
    [108, 142, 241],
    [119, 154, 247],
    [130, 165, 251],
    [141, 176, 254],
    [152, 185, 255],
    [163, 194, 255],
    [174, 201, 253],
    [184, 208, 249],
    [194, 213, 244],
    [204, 217, 238],
    [213, 219, 230],
    [221, 221, 221],
    [229, 216, 209],
    [236, 211, 197],
    [241, 204, 185],
    [245, 196, 173],
    [247, 187, 160],
    [247, 177, 148],
    [247, 166, 135],
    [244, 154, 123],
    [241, 141, 111],
    [236, 127, 99],
    [229, 112, 88],
    [222, 96, 77],
    [213, 80, 66],
    [203, 62, 56],
    [192, 40, 47],
    [180, 4, 38],
];

/// ColorBrewer red-blue diverging map (red at 0)
pub const RDBU_ANCHORS: [[u8; 3]; 11] = [
    [103, 0, 31],
    [178, 24, 43],
    [214, 96, 77],
    [244, 165, 130],
    [253, 219, 199],
    [247, 247, 247],
    [209, 229, 240],
    [146, 197, 222],
    [67, 147, 195],
    [33, 102, 172],
    [5, 48, 97],
];

pub const VIRIDIS_ANCHORS: [[u8; 3]; 11] = [
    [68, 1, 84],
    [72, 36, 117],
    [65, 68, 135],
    [53, 95, 141],
    [42, 120, 142],
    [33, 145, 140],
    [34, 168, 132],
    [68, 190, 112],
    [122, 209, 81],
    [189, 223, 38],
    [253, 231, 37],
];

pub const INFERNO_ANCHORS: [[u8; 3]; 11] = [
    [0, 0, 4],
    [22, 11, 57],
    [66, 10, 104],
    [106, 23, 110],
    [147, 38, 103],
    [188, 55, 84],
    [221, 81, 58],
    [243, 120, 25],
    [252, 165, 10],
    [246, 215, 70],
    [252, 255, 164],
];

/// Cyan-blue-gray-red-yellow map used for signed source estimates
pub const MNE_ANCHORS: [[u8; 3]; 5] = [
    [0, 255, 255],
    [0, 0, 255],
    [128, 128, 128],
    [255, 0, 0],
    [255, 255, 0],
];

pub const GRAY_ANCHORS: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];
