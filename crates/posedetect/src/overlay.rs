use image::{Rgb, RgbImage};
use pose_core::{POSE_CONNECTIONS, PoseResult};

const BONE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const JOINT_COLOR: Rgb<u8> = Rgb([255, 48, 48]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const CAPTION_BG: Rgb<u8> = Rgb([0, 0, 0]);
const GLYPH_ADVANCE: i32 = 6;
const VISIBILITY_THRESHOLD: f32 = 0.5;

/// Draws a detected pose over its source frame.
pub trait OverlayRenderer {
    fn render(&self, image: &RgbImage, pose: &PoseResult) -> RgbImage;
}

/// Skeleton lines, joint markers and a one-line caption in a built-in
/// 5x7 bitmap font.
#[derive(Debug, Clone, Default)]
pub struct SkeletonOverlay {
    show_timestamp: bool,
}

impl SkeletonOverlay {
    pub fn new(show_timestamp: bool) -> Self {
        Self { show_timestamp }
    }

    fn caption(&self, pose: &PoseResult) -> String {
        let mut text = format!(
            "CONF {:.0}%  FRAME {:06}",
            pose.confidence() * 100.0,
            pose.frame_id()
        );
        if self.show_timestamp {
            text.push_str(&format!("  T {:.2}S", pose.timestamp()));
        }
        text
    }
}

impl OverlayRenderer for SkeletonOverlay {
    fn render(&self, image: &RgbImage, pose: &PoseResult) -> RgbImage {
        let mut canvas = image.clone();
        let (width, height) = canvas.dimensions();
        let landmarks = pose.landmarks();
        let to_px = |index: usize| {
            let lm = landmarks[index];
            (
                (lm.x * (width.saturating_sub(1)) as f32).round() as i32,
                (lm.y * (height.saturating_sub(1)) as f32).round() as i32,
            )
        };
        let visible = |index: usize| landmarks[index].visibility >= VISIBILITY_THRESHOLD;

        for &(a, b) in POSE_CONNECTIONS.iter() {
            if visible(a) && visible(b) {
                draw_line(&mut canvas, to_px(a), to_px(b), BONE_COLOR);
            }
        }
        for index in 0..landmarks.len() {
            if visible(index) {
                let (x, y) = to_px(index);
                fill_rect(&mut canvas, x - 2, y - 2, x + 2, y + 2, JOINT_COLOR);
            }
        }

        let caption = self.caption(pose);
        let text_width = caption.chars().count() as i32 * GLYPH_ADVANCE;
        fill_rect(&mut canvas, 2, 2, 2 + text_width + 3, 2 + 10, CAPTION_BG);
        draw_label(&mut canvas, 4, 4, &caption, TEXT_COLOR);
        canvas
    }
}

fn put_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    for y in top..=bottom {
        for x in left..=right {
            put_pixel(image, x, y, color);
        }
    }
}

fn draw_label(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        put_pixel(image, x + col, y + row as i32, color);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '%' => [0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(bits)
}
