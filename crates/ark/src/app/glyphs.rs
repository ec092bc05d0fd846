//! 3x5 bitmap font for labels. Lowercase letters draw as uppercase.

pub(crate) const GLYPH_WIDTH: i32 = 3;
pub(crate) const GLYPH_HEIGHT: i32 = 5;

/// Rows packed top to bottom, three bits each, leftmost column highest.
fn glyph_bits(ch: char) -> u16 {
    match ch.to_ascii_uppercase() {
        ' ' => 0,
        'A' => 0b010_101_111_101_101,
        'B' => 0b110_101_110_101_110,
        'C' => 0b011_100_100_100_011,
        'D' => 0b110_101_101_101_110,
        'E' => 0b111_100_110_100_111,
        'F' => 0b111_100_110_100_100,
        'G' => 0b011_100_101_101_011,
        'H' => 0b101_101_111_101_101,
        'I' => 0b111_010_010_010_111,
        'J' => 0b001_001_001_101_010,
        'K' => 0b101_101_110_101_101,
        'L' => 0b100_100_100_100_111,
        'M' => 0b101_111_111_101_101,
        'N' => 0b110_101_101_101_101,
        'O' => 0b010_101_101_101_010,
        'P' => 0b110_101_110_100_100,
        'Q' => 0b010_101_101_110_011,
        'R' => 0b110_101_110_101_101,
        'S' => 0b011_100_010_001_110,
        'T' => 0b111_010_010_010_010,
        'U' => 0b101_101_101_101_111,
        'V' => 0b101_101_101_101_010,
        'W' => 0b101_101_111_111_101,
        'X' => 0b101_101_010_101_101,
        'Y' => 0b101_101_010_010_010,
        'Z' => 0b111_001_010_100_111,
        '0' => 0b111_101_101_101_111,
        '1' => 0b010_110_010_010_111,
        '2' => 0b110_001_010_100_111,
        '3' => 0b110_001_010_001_110,
        '4' => 0b101_101_111_001_001,
        '5' => 0b111_100_110_001_110,
        '6' => 0b011_100_111_101_111,
        '7' => 0b111_001_010_010_010,
        '8' => 0b111_101_111_101_111,
        '9' => 0b111_101_111_001_110,
        '.' => 0b000_000_000_000_010,
        ',' => 0b000_000_000_010_100,
        ':' => 0b000_010_000_010_000,
        '!' => 0b010_010_010_000_010,
        '-' => 0b000_000_111_000_000,
        '+' => 0b000_010_111_010_000,
        '=' => 0b000_111_000_111_000,
        '(' => 0b001_010_010_010_001,
        ')' => 0b100_010_010_010_100,
        '#' => 0b101_111_101_111_101,
        '/' => 0b001_001_010_100_100,
        '_' => 0b000_000_000_000_111,
        _ => 0b110_001_010_000_010,
    }
}

fn is_set(bits: u16, row: i32, col: i32) -> bool {
    let shift = (GLYPH_HEIGHT - 1 - row) * GLYPH_WIDTH + (GLYPH_WIDTH - 1 - col);
    bits & (1 << shift) != 0
}

/// Horizontal distance between glyph origins at `scale`.
pub(crate) fn advance(scale: i32) -> i32 {
    (GLYPH_WIDTH + 1) * scale
}

pub(crate) fn text_width(text: &str, scale: i32) -> i32 {
    let count = text.chars().count() as i32;
    if count == 0 {
        return 0;
    }
    count * advance(scale) - scale
}

/// Draws `text` with its top-left corner at `(x, y)`, clipped to the frame.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_text(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    text: &str,
    scale: i32,
    color: [u8; 4],
) {
    let scale = scale.max(1);
    let mut origin_x = x;
    for ch in text.chars() {
        let bits = glyph_bits(ch);
        for row in 0..GLYPH_HEIGHT {
            for col in 0..GLYPH_WIDTH {
                if !is_set(bits, row, col) {
                    continue;
                }
                super::renderer::fill_rect(
                    frame,
                    width,
                    height,
                    origin_x + col * scale,
                    y + row * scale,
                    scale,
                    scale,
                    color,
                );
            }
        }
        origin_x += advance(scale);
    }
}
