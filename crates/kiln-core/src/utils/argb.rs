// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Helpers for colors packed as `0xAARRGGBB`.

/// Alpha channel of a packed color.
pub const fn alpha(argb: u32) -> u8 {
    (argb >> 24) as u8
}

/// Red channel of a packed color.
pub const fn red(argb: u32) -> u8 {
    (argb >> 16) as u8
}

/// Green channel of a packed color.
pub const fn green(argb: u32) -> u8 {
    (argb >> 8) as u8
}

/// Blue channel of a packed color.
pub const fn blue(argb: u32) -> u8 {
    argb as u8
}

/// Normalized `[r, g, b, a]` floats, as a driver clear color expects them.
pub fn to_rgba_f32(argb: u32) -> [f32; 4] {
    [
        red(argb) as f32 / 255.0,
        green(argb) as f32 / 255.0,
        blue(argb) as f32 / 255.0,
        alpha(argb) as f32 / 255.0,
    ]
}

/// The byte layout of the color in an `Rgba8Unorm` texel.
pub const fn to_rgba_bytes(argb: u32) -> [u8; 4] {
    [red(argb), green(argb), blue(argb), alpha(argb)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn channels_unpack_in_argb_order() {
        let color = 0x80FF_4010;
        assert_eq!(alpha(color), 0x80);
        assert_eq!(red(color), 0xFF);
        assert_eq!(green(color), 0x40);
        assert_eq!(blue(color), 0x10);
        assert_eq!(to_rgba_bytes(color), [0xFF, 0x40, 0x10, 0x80]);
    }

    #[test]
    fn floats_are_normalized() {
        let [r, g, b, a] = to_rgba_f32(0xFF00_FF00);
        assert_relative_eq!(r, 0.0);
        assert_relative_eq!(g, 1.0);
        assert_relative_eq!(b, 0.0);
        assert_relative_eq!(a, 1.0);
    }
}
