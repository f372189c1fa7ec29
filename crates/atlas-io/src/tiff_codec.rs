//! GeoTIFF raster codec
//!
//! Rasters are held band-major, the way geospatial tools usually expose
//! them: an `Array3` indexed `(band, row, col)`. On disk the samples are
//! pixel-interleaved, so reads and writes transpose between the two.
//!
//! Geo-referencing lives in a handful of private TIFF tags. They are read
//! into [`GeoKeys`] verbatim and written back unchanged, which is enough to
//! re-create an equivalent file without interpreting the CRS.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;

use crate::codec::{ensure_exists, IoError, IoResult, PayloadCodec};

/// Sample type of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterDtype {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

/// Band-major raster samples, `(band, row, col)`
#[derive(Debug, Clone, PartialEq)]
pub enum RasterData {
    U8(Array3<u8>),
    U16(Array3<u16>),
    I16(Array3<i16>),
    U32(Array3<u32>),
    I32(Array3<i32>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

impl RasterData {
    pub fn dtype(&self) -> RasterDtype {
        match self {
            RasterData::U8(_) => RasterDtype::U8,
            RasterData::U16(_) => RasterDtype::U16,
            RasterData::I16(_) => RasterDtype::I16,
            RasterData::U32(_) => RasterDtype::U32,
            RasterData::I32(_) => RasterDtype::I32,
            RasterData::F32(_) => RasterDtype::F32,
            RasterData::F64(_) => RasterDtype::F64,
        }
    }

    /// `(bands, rows, cols)`
    pub fn shape(&self) -> (usize, usize, usize) {
        match self {
            RasterData::U8(a) => a.dim(),
            RasterData::U16(a) => a.dim(),
            RasterData::I16(a) => a.dim(),
            RasterData::U32(a) => a.dim(),
            RasterData::I32(a) => a.dim(),
            RasterData::F32(a) => a.dim(),
            RasterData::F64(a) => a.dim(),
        }
    }

    /// Widen every sample to f64
    pub fn to_f64(&self) -> Array3<f64> {
        match self {
            RasterData::U8(a) => a.mapv(f64::from),
            RasterData::U16(a) => a.mapv(f64::from),
            RasterData::I16(a) => a.mapv(f64::from),
            RasterData::U32(a) => a.mapv(f64::from),
            RasterData::I32(a) => a.mapv(f64::from),
            RasterData::F32(a) => a.mapv(f64::from),
            RasterData::F64(a) => a.clone(),
        }
    }
}

/// GeoTIFF tags carried through a read/write cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoKeys {
    /// ModelPixelScaleTag: `(sx, sy, sz)`
    pub pixel_scale: Option<Vec<f64>>,
    /// ModelTiepointTag: repeated `(i, j, k, x, y, z)`
    pub tie_points: Option<Vec<f64>>,
    /// ModelTransformationTag: row-major 4x4 matrix
    pub transformation: Option<Vec<f64>>,
    pub key_directory: Option<Vec<u16>>,
    pub double_params: Option<Vec<f64>>,
    pub ascii_params: Option<String>,
    /// GDAL_NODATA, stored as text by convention
    pub nodata: Option<String>,
}

impl GeoKeys {
    /// True when the file carries no geo-referencing at all
    pub fn is_empty(&self) -> bool {
        *self == GeoKeys::default()
    }
}

/// Metadata needed to re-write an equivalent raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterProfile {
    pub width: u32,
    pub height: u32,
    pub count: usize,
    pub dtype: RasterDtype,
    pub geo: GeoKeys,
}

impl RasterProfile {
    /// Affine transform in GDAL order
    /// `(origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h)`.
    pub fn geo_transform(&self) -> Option<[f64; 6]> {
        if let Some(m) = self.geo.transformation.as_deref() {
            if m.len() >= 8 {
                return Some([m[3], m[0], m[1], m[7], m[4], m[5]]);
            }
        }

        let scale = self.geo.pixel_scale.as_deref()?;
        let tie = self.geo.tie_points.as_deref()?;
        if scale.len() < 2 || tie.len() < 6 {
            return None;
        }
        let origin_x = tie[3] - tie[0] * scale[0];
        let origin_y = tie[4] + tie[1] * scale[1];
        Some([origin_x, scale[0], 0.0, origin_y, 0.0, -scale[1]])
    }

    /// Numeric nodata value, if declared and parseable
    pub fn nodata_value(&self) -> Option<f64> {
        self.geo.nodata.as_deref()?.trim().parse().ok()
    }
}

/// A raster held in memory: samples plus the profile to write them back
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPayload {
    pub array: RasterData,
    pub profile: RasterProfile,
}

impl RasterPayload {
    /// Build a payload, deriving dimensions and dtype from `array`
    pub fn new(array: RasterData, geo: GeoKeys) -> Self {
        let (count, rows, cols) = array.shape();
        let profile = RasterProfile {
            width: cols as u32,
            height: rows as u32,
            count,
            dtype: array.dtype(),
            geo,
        };
        Self { array, profile }
    }

    /// Replace the samples, keeping geo-referencing and updating dimensions
    pub fn set_array(&mut self, array: RasterData) {
        let (count, rows, cols) = array.shape();
        self.profile.width = cols as u32;
        self.profile.height = rows as u32;
        self.profile.count = count;
        self.profile.dtype = array.dtype();
        self.array = array;
    }

    pub fn bands(&self) -> usize {
        self.profile.count
    }

    fn check_profile(&self) -> IoResult<()> {
        let (count, rows, cols) = self.array.shape();
        let expected = self.profile.count * self.profile.height as usize * self.profile.width as usize;
        if count != self.profile.count
            || rows != self.profile.height as usize
            || cols != self.profile.width as usize
        {
            return Err(IoError::ShapeMismatch {
                expected,
                actual: count * rows * cols,
            });
        }
        if self.array.dtype() != self.profile.dtype {
            return Err(IoError::InvalidFormat(format!(
                "profile dtype {:?} does not match array dtype {:?}",
                self.profile.dtype,
                self.array.dtype()
            )));
        }
        Ok(())
    }
}

/// GeoTIFF codec (first image of the file only)
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffCodec;

impl GeoTiffCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadCodec for GeoTiffCodec {
    type Payload = RasterPayload;

    fn read(&self, path: &Path) -> IoResult<RasterPayload> {
        ensure_exists(path)?;

        let file = File::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let geo = read_geo_keys(&mut decoder)?;
        let grid = (height as usize, width as usize);

        let array = match decoder.read_image()? {
            DecodingResult::U8(v) => RasterData::U8(band_major(v, grid)?),
            DecodingResult::U16(v) => RasterData::U16(band_major(v, grid)?),
            DecodingResult::I16(v) => RasterData::I16(band_major(v, grid)?),
            DecodingResult::U32(v) => RasterData::U32(band_major(v, grid)?),
            DecodingResult::I32(v) => RasterData::I32(band_major(v, grid)?),
            DecodingResult::F32(v) => RasterData::F32(band_major(v, grid)?),
            DecodingResult::F64(v) => RasterData::F64(band_major(v, grid)?),
            _ => {
                return Err(IoError::Unsupported(format!(
                    "sample format of {}",
                    path.display()
                )))
            }
        };

        Ok(RasterPayload::new(array, geo))
    }

    fn write(&self, payload: &RasterPayload, path: &Path) -> IoResult<()> {
        payload.check_profile()?;
        check_layout(&payload.array)?;

        let (bands, rows, cols) = payload.array.shape();
        let (width, height) = (cols as u32, rows as u32);
        let geo = &payload.profile.geo;

        let mut writer = BufWriter::new(File::create(path)?);
        {
            let mut encoder = TiffEncoder::new(&mut writer)?;
            let enc = &mut encoder;
            match (&payload.array, bands) {
                (RasterData::U8(a), 1) => {
                    write_image::<colortype::Gray8, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::U8(a), 3) => {
                    write_image::<colortype::RGB8, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::U8(a), 4) => {
                    write_image::<colortype::RGBA8, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::U16(a), 1) => {
                    write_image::<colortype::Gray16, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::U16(a), 3) => {
                    write_image::<colortype::RGB16, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::U16(a), 4) => {
                    write_image::<colortype::RGBA16, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::I16(a), 1) => {
                    write_image::<colortype::GrayI16, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::U32(a), 1) => {
                    write_image::<colortype::Gray32, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::I32(a), 1) => {
                    write_image::<colortype::GrayI32, _>(enc, width, height, &interleave(a), geo)
                }
                (RasterData::F32(a), 1) => write_image::<colortype::Gray32Float, _>(
                    enc,
                    width,
                    height,
                    &interleave(a),
                    geo,
                ),
                (RasterData::F64(a), 1) => write_image::<colortype::Gray64Float, _>(
                    enc,
                    width,
                    height,
                    &interleave(a),
                    geo,
                ),
                (array, bands) => Err(IoError::Unsupported(format!(
                    "writing {} band(s) of {:?}",
                    bands,
                    array.dtype()
                ))),
            }?;
        }
        writer.flush()?;

        Ok(())
    }

    fn format_name(&self) -> &'static str {
        "GeoTIFF"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tif", "tiff"]
    }
}

/// Band layouts the encoder has a color type for
fn check_layout(array: &RasterData) -> IoResult<()> {
    let (bands, _, _) = array.shape();
    let supported = match array {
        RasterData::U8(_) | RasterData::U16(_) => matches!(bands, 1 | 3 | 4),
        _ => bands == 1,
    };
    if supported {
        Ok(())
    } else {
        Err(IoError::Unsupported(format!(
            "writing {} band(s) of {:?}",
            bands,
            array.dtype()
        )))
    }
}

fn read_geo_keys<R: Read + Seek>(decoder: &mut Decoder<R>) -> IoResult<GeoKeys> {
    Ok(GeoKeys {
        pixel_scale: f64_tag(decoder, Tag::ModelPixelScaleTag)?,
        tie_points: f64_tag(decoder, Tag::ModelTiepointTag)?,
        transformation: f64_tag(decoder, Tag::ModelTransformationTag)?,
        key_directory: decoder
            .find_tag(Tag::GeoKeyDirectoryTag)?
            .map(|v| v.into_u16_vec())
            .transpose()?,
        double_params: f64_tag(decoder, Tag::GeoDoubleParamsTag)?,
        ascii_params: ascii_tag(decoder, Tag::GeoAsciiParamsTag)?,
        nodata: ascii_tag(decoder, Tag::GdalNodata)?,
    })
}

fn f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> IoResult<Option<Vec<f64>>> {
    Ok(decoder
        .find_tag(tag)?
        .map(|v| v.into_f64_vec())
        .transpose()?)
}

/// ASCII tags are NUL-terminated on disk
fn ascii_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> IoResult<Option<String>> {
    Ok(decoder
        .find_tag(tag)?
        .map(|v| v.into_string())
        .transpose()?
        .map(|s| s.trim_end_matches('\0').to_string()))
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    geo: &GeoKeys,
) -> IoResult<()> {
    if let Some(v) = &geo.pixel_scale {
        dir.write_tag(Tag::ModelPixelScaleTag, &v[..])?;
    }
    if let Some(v) = &geo.tie_points {
        dir.write_tag(Tag::ModelTiepointTag, &v[..])?;
    }
    if let Some(v) = &geo.transformation {
        dir.write_tag(Tag::ModelTransformationTag, &v[..])?;
    }
    if let Some(v) = &geo.key_directory {
        dir.write_tag(Tag::GeoKeyDirectoryTag, &v[..])?;
    }
    if let Some(v) = &geo.double_params {
        dir.write_tag(Tag::GeoDoubleParamsTag, &v[..])?;
    }
    if let Some(s) = &geo.ascii_params {
        dir.write_tag(Tag::GeoAsciiParamsTag, s.as_str())?;
    }
    if let Some(s) = &geo.nodata {
        dir.write_tag(Tag::GdalNodata, s.as_str())?;
    }
    Ok(())
}

fn write_image<C, W>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    geo: &GeoKeys,
) -> IoResult<()>
where
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let mut image = encoder.new_image::<C>(width, height)?;
    write_geo_tags(image.encoder(), geo)?;
    image.write_data(data)?;
    Ok(())
}

/// Pixel-interleaved samples -> `(band, row, col)`
fn band_major<T: Clone>(data: Vec<T>, (rows, cols): (usize, usize)) -> IoResult<Array3<T>> {
    let pixels = rows * cols;
    if pixels == 0 || data.len() % pixels != 0 {
        return Err(IoError::ShapeMismatch {
            expected: pixels,
            actual: data.len(),
        });
    }
    let bands = data.len() / pixels;
    let interleaved = Array3::from_shape_vec((rows, cols, bands), data)
        .map_err(|e| IoError::InvalidFormat(e.to_string()))?;
    Ok(interleaved
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .into_owned())
}

/// `(band, row, col)` -> pixel-interleaved samples
fn interleave<T: Clone>(array: &Array3<T>) -> Vec<T> {
    array.view().permuted_axes([1, 2, 0]).iter().cloned().collect()
}
