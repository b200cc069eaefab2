//! Deterministic stand-in for the ONNX models.
//!
//! Test images are rows of 8×8 solid tiles. Every non-black tile is one
//! "face" whose encoding is its RGB colour, so equal colours match and
//! primary colours are orthogonal.

use image::{ImageFormat, Rgb, RgbImage};
use rollcall_core::{BoundingBox, EncodeError, Embedding, FaceEncoder};
use std::io::Cursor;

pub const TILE: u32 = 8;

pub const BLACK: [u8; 3] = [0, 0, 0];
pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// PNG bytes of one tile per colour, left to right.
pub fn tiles_png(colors: &[[u8; 3]]) -> Vec<u8> {
    let image = RgbImage::from_fn(TILE * colors.len() as u32, TILE, |x, _| {
        Rgb(colors[(x / TILE) as usize])
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode test png");
    bytes
}

pub struct TileEncoder;

impl FaceEncoder for TileEncoder {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EncodeError> {
        let faces = (0..image.width() / TILE)
            .filter(|i| image.get_pixel(i * TILE + TILE / 2, TILE / 2).0 != BLACK)
            .map(|i| BoundingBox {
                x: (i * TILE) as f32,
                y: 0.0,
                width: TILE as f32,
                height: TILE as f32,
                confidence: 0.9,
                landmarks: None,
            })
            .collect();
        Ok(faces)
    }

    fn encode(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, EncodeError> {
        let center = image.get_pixel(face.x as u32 + TILE / 2, TILE / 2);
        Ok(Embedding::new(center.0.iter().map(|&c| c as f32).collect()))
    }
}
