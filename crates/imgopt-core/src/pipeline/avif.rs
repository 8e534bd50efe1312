//! AVIF decoding: `avif-parse` reads the container, `rav1d` decodes the AV1
//! payload.
//!
//! The `image` crate only ships an AVIF encoder, so both AVIF inputs and
//! re-probed AVIF outputs come through here.

use image::{DynamicImage, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib::{
    dav1d_close, dav1d_data_create, dav1d_data_unref, dav1d_default_settings, dav1d_get_picture,
    dav1d_open, dav1d_picture_unref, dav1d_send_data,
};
use std::io::Cursor;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use super::backend::BackendError;
use super::resize::Dimensions;

fn invalid<E: std::fmt::Debug>(error: E) -> BackendError {
    BackendError::Decode(format!("invalid AVIF container: {error:?}"))
}

fn rav1d_failed(step: &str, code: i32) -> BackendError {
    BackendError::Decode(format!("rav1d {step} failed ({code})"))
}

/// Frame size from the container header, without decoding pixels.
pub fn dimensions(data: &[u8]) -> Result<Dimensions, BackendError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(data)).map_err(invalid)?;
    let meta = avif.primary_item_metadata().map_err(invalid)?;
    Ok(Dimensions::new(
        meta.max_frame_width.get(),
        meta.max_frame_height.get(),
    ))
}

/// Decode the primary item to 8-bit RGB. Alpha is dropped.
pub fn decode(data: &[u8]) -> Result<DynamicImage, BackendError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(data)).map_err(invalid)?;
    let payload: &[u8] = &avif.primary_item;

    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    // SAFETY: dav1d_default_settings writes every field before we read it.
    let mut settings = unsafe {
        dav1d_default_settings(NonNull::from(&mut settings).cast());
        settings.assume_init()
    };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    // SAFETY: both pointers come from live locals.
    let rc = unsafe { dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(rav1d_failed("open", rc.0));
    }

    let decoded = (|| -> Result<RgbImage, BackendError> {
        let mut input = Dav1dData::default();
        // SAFETY: `input` is a live, empty data record.
        let buffer = unsafe { dav1d_data_create(NonNull::new(&mut input), payload.len()) };
        if buffer.is_null() {
            return Err(BackendError::Decode(
                "rav1d could not allocate the input buffer".to_string(),
            ));
        }
        // SAFETY: `buffer` holds `payload.len()` writable bytes owned by `input`.
        unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), buffer, payload.len()) };

        // SAFETY: on success the decoder takes ownership of `input`.
        let rc = unsafe { dav1d_send_data(ctx, NonNull::new(&mut input)) };
        if rc.0 != 0 {
            unsafe { dav1d_data_unref(NonNull::new(&mut input)) };
            return Err(rav1d_failed("send_data", rc.0));
        }

        // SAFETY: an all-zero picture is the empty state get_picture fills in.
        let mut picture: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d_get_picture(ctx, NonNull::new(&mut picture)) };
        if rc.0 != 0 {
            return Err(rav1d_failed("get_picture", rc.0));
        }

        let rgb = to_rgb(&picture);
        unsafe { dav1d_picture_unref(NonNull::new(&mut picture)) };
        rgb
    })();

    // SAFETY: `ctx` was opened above and is closed exactly once.
    unsafe { dav1d_close(NonNull::new(&mut ctx)) };
    decoded.map(DynamicImage::ImageRgb8)
}

/// Plane pointers and geometry of a decoded picture.
struct Planes {
    luma: *const u8,
    chroma: Option<(*const u8, *const u8)>,
    luma_stride: isize,
    chroma_stride: isize,
    bits: u32,
    subsample_x: bool,
    subsample_y: bool,
}

impl Planes {
    /// Read one sample; 10 and 12-bit samples are stored as u16.
    ///
    /// # Safety
    /// `plane` must belong to a live picture and `(x, y)` must lie inside it.
    unsafe fn sample(&self, plane: *const u8, stride: isize, x: u32, y: u32) -> f32 {
        if self.bits <= 8 {
            *plane.offset(y as isize * stride + x as isize) as f32
        } else {
            let offset = y as isize * stride + x as isize * 2;
            (plane.offset(offset) as *const u16).read_unaligned() as f32
        }
    }
}

fn plane(picture: &Dav1dPicture, index: usize) -> Result<*const u8, BackendError> {
    picture.data[index]
        .map(|p| p.as_ptr() as *const u8)
        .ok_or_else(|| BackendError::Decode(format!("AVIF picture is missing plane {index}")))
}

/// YCbCr to interleaved RGB8 with BT.601 coefficients.
fn to_rgb(picture: &Dav1dPicture) -> Result<RgbImage, BackendError> {
    let width = picture.p.w as u32;
    let height = picture.p.h as u32;
    let bits = picture.p.bpc as u32;
    if !(8..=16).contains(&bits) {
        return Err(BackendError::Decode(format!(
            "unsupported AVIF bit depth {bits}"
        )));
    }

    let layout = picture.p.layout;
    let (chroma, subsample_x, subsample_y) = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        (None, false, false)
    } else {
        let (sx, sy) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            other => {
                return Err(BackendError::Decode(format!(
                    "unsupported AVIF pixel layout {other}"
                )))
            }
        };
        (Some((plane(picture, 1)?, plane(picture, 2)?)), sx, sy)
    };

    let planes = Planes {
        luma: plane(picture, 0)?,
        chroma,
        luma_stride: picture.stride[0],
        chroma_stride: picture.stride[1],
        bits,
        subsample_x,
        subsample_y,
    };

    let scale = 255.0 / ((1u32 << bits) - 1) as f32;
    let center = (1u32 << (bits - 1)) as f32;
    let to_u8 = |v: f32| (v * scale).round().clamp(0.0, 255.0) as u8;

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            // SAFETY: x < width and y < height of the decoded picture.
            let luma = unsafe { planes.sample(planes.luma, planes.luma_stride, x, y) };
            let pixel = match planes.chroma {
                None => {
                    let v = to_u8(luma);
                    [v, v, v]
                }
                Some((cb_plane, cr_plane)) => {
                    let cx = if planes.subsample_x { x / 2 } else { x };
                    let cy = if planes.subsample_y { y / 2 } else { y };
                    // SAFETY: subsampled coordinates stay inside the chroma planes.
                    let (cb, cr) = unsafe {
                        (
                            planes.sample(cb_plane, planes.chroma_stride, cx, cy) - center,
                            planes.sample(cr_plane, planes.chroma_stride, cx, cy) - center,
                        )
                    };
                    [
                        to_u8(luma + 1.402 * cr),
                        to_u8(luma - 0.344_136 * cb - 0.714_136 * cr),
                        to_u8(luma + 1.772 * cb),
                    ]
                }
            };
            rgb.extend_from_slice(&pixel);
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| BackendError::Decode("decoded AVIF buffer has the wrong size".to_string()))
}
