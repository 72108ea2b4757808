//! Landmark overlay and frame encoding for the status surface

use camera_capture::VideoFrame;
use dms::FaceLandmarks;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageResult, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

const MESH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const EYE_COLOR: Rgb<u8> = Rgb([255, 64, 0]);
const EYE_RADIUS: i32 = 2;

/// Frame as an image, with landmarks drawn when given
pub fn render(frame: &VideoFrame, landmarks: Option<&FaceLandmarks>) -> Option<RgbImage> {
    let mut img = frame.to_rgb_image()?;
    if let Some(face) = landmarks {
        draw_landmarks(&mut img, face);
    }
    Some(img)
}

fn draw_landmarks(img: &mut RgbImage, face: &FaceLandmarks) {
    let (width, height) = img.dimensions();

    for point in &face.points {
        if let Some((x, y)) = to_pixel(point.x, point.y, width, height) {
            img.put_pixel(x as u32, y as u32, MESH_COLOR);
        }
    }
    for point in face.eye_points() {
        if let Some(center) = to_pixel(point.x, point.y, width, height) {
            draw_filled_circle_mut(img, center, EYE_RADIUS, EYE_COLOR);
        }
    }
}

/// Pixel for a normalized point, `None` when it is not on the image
fn to_pixel(x: f32, y: f32, width: u32, height: u32) -> Option<(i32, i32)> {
    let px = x * width as f32;
    let py = y * height as f32;
    let on_image = px.is_finite()
        && py.is_finite()
        && px >= 0.0
        && py >= 0.0
        && px < width as f32
        && py < height as f32;
    on_image.then(|| (px as i32, py as i32))
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(img)?;
    Ok(buf)
}
