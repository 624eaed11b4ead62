//! Telemetry overlay.
//!
//! Draws an opaque black band across the bottom of a frame and renders the
//! sensor caption into it in white. The routine is stateless given a frame
//! and a snapshot; the capture worker and every live feed consumer share it.
//!
//! Text is rasterized from a small embedded 5x7 glyph table covering the
//! telemetry alphabet (digits, punctuation and the handful of letters the
//! caption uses). Characters outside the table render as blank space.

use image::Rgb;

use crate::frame::Frame;
use crate::sensor::SensorSnapshot;

/// Height of the opaque band at the bottom of the frame, in pixels.
pub const BAND_HEIGHT: u32 = 40;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const SCALE: u32 = 2;
const TEXT_ORIGIN_X: u32 = 10;
const BAND_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Composite the sensor caption onto the bottom of `frame`.
pub fn draw_telemetry(frame: &mut Frame, snapshot: &SensorSnapshot) {
    let caption = snapshot.caption();
    draw_band(frame);
    draw_text(frame, &caption);
}

fn draw_band(frame: &mut Frame) {
    let width = frame.width();
    let height = frame.height();
    let band_top = height.saturating_sub(BAND_HEIGHT);
    let image = frame.image_mut();
    for y in band_top..height {
        for x in 0..width {
            image.put_pixel(x, y, BAND_COLOR);
        }
    }
}

fn draw_text(frame: &mut Frame, text: &str) {
    let width = frame.width();
    let height = frame.height();
    let band_top = height.saturating_sub(BAND_HEIGHT);
    let band_height = height - band_top;
    let text_top = band_top + band_height.saturating_sub(GLYPH_HEIGHT * SCALE) / 2;
    let advance = (GLYPH_WIDTH + 1) * SCALE;

    let image = frame.image_mut();
    let mut pen_x = TEXT_ORIGIN_X;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    for dy in 0..SCALE {
                        for dx in 0..SCALE {
                            let x = pen_x + col * SCALE + dx;
                            let y = text_top + row as u32 * SCALE + dy;
                            if x < width && y < height {
                                image.put_pixel(x, y, TEXT_COLOR);
                            }
                        }
                    }
                }
            }
        }
        pen_x += advance;
        if pen_x >= width {
            break;
        }
    }
}

/// 5x7 glyphs, one byte per row, most significant of the low five bits on
/// the left. Covers exactly the characters the caption can produce.
fn glyph(c: char) -> Option<&'static [u8; 7]> {
    const GLYPHS: &[(char, [u8; 7])] = &[
        ('0', [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        ('1', [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        ('2', [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        ('3', [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
        ('4', [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        ('5', [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        ('6', [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        ('7', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        ('8', [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        ('9', [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        ('-', [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000]),
        (':', [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000]),
        ('.', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100]),
        (',', [0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00100, 0b01000]),
        ('=', [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000]),
        ('C', [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
        ('P', [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
        ('T', [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        ('U', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        ('h', [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001]),
        ('a', [0b00000, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111]),
    ];
    GLYPHS.iter().find(|(g, _)| *g == c).map(|(_, rows)| rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::from_raw(width, height, vec![value; (width * height * 3) as usize], 0)
            .expect("valid buffer")
    }

    fn sample_snapshot() -> SensorSnapshot {
        SensorSnapshot {
            timestamp: chrono::Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap(),
            temperature: 21.53,
            humidity: 0.0,
            pressure: 1001.23,
            cpu_temperature: 45.6,
        }
    }

    #[test]
    fn band_is_opaque_black() {
        let mut frame = solid_frame(320, 240, 90);
        draw_telemetry(&mut frame, &sample_snapshot());

        // Every band pixel is black or white (text), never background.
        let band_top = 240 - BAND_HEIGHT;
        for y in band_top..240 {
            for x in 0..320 {
                let pixel = frame.image().get_pixel(x, y);
                assert!(pixel.0 == [0, 0, 0] || pixel.0 == [255, 255, 255]);
            }
        }
        // Pixels above the band are untouched.
        assert_eq!(frame.image().get_pixel(0, 0).0, [90, 90, 90]);
        assert_eq!(frame.image().get_pixel(319, band_top - 1).0, [90, 90, 90]);
    }

    #[test]
    fn text_renders_into_the_band() {
        let mut frame = solid_frame(640, 480, 90);
        draw_telemetry(&mut frame, &sample_snapshot());

        let band_top = 480 - BAND_HEIGHT;
        let white = (band_top..480)
            .flat_map(|y| (0..640).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.image().get_pixel(x, y).0 == [255, 255, 255])
            .count();
        assert!(white > 100, "expected rendered text, found {} white pixels", white);
    }

    #[test]
    fn every_caption_character_has_a_glyph() {
        let caption = sample_snapshot().caption();
        for c in caption.chars() {
            if c == ' ' {
                continue;
            }
            assert!(glyph(c).is_some(), "no glyph for '{}'", c);
        }
    }

    #[test]
    fn overlay_clamps_on_frames_shorter_than_the_band() {
        let mut frame = solid_frame(32, 16, 90);
        draw_telemetry(&mut frame, &sample_snapshot());
        // Whole frame becomes band; must not panic.
        assert_eq!(frame.image().get_pixel(0, 0).0, [0, 0, 0]);
    }
}
