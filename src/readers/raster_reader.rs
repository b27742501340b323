use crate::error::{ProcessingError, Result};
use crate::models::{CellValue, DateRange, Location};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, warn};

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const MODEL_TRANSFORMATION_TAG: u16 = 34264;
const GDAL_NODATA_TAG: u16 = 42113;

/// A daily raster file and the date encoded in its name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RasterFile {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Daily raster files found in a directory, ordered by date
pub struct RasterCatalog {
    files: Vec<RasterFile>,
}

impl RasterCatalog {
    /// Scan a directory for `.tif` files whose names end in a date
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_tiff = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
            if !path.is_file() || !is_tiff {
                continue;
            }

            match date_from_file_name(&path) {
                Some(date) => files.push(RasterFile { date, path }),
                None => warn!(path = %path.display(), "raster file name carries no date, skipped"),
            }
        }

        files.sort();
        files.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                warn!(path = %later.path.display(), date = %later.date, "second raster for the same date ignored");
                true
            } else {
                false
            }
        });

        Ok(Self { files })
    }

    pub fn files(&self) -> &[RasterFile] {
        &self.files
    }

    /// Files whose date falls inside `range`
    pub fn within(&self, range: &DateRange) -> Vec<RasterFile> {
        self.files
            .iter()
            .filter(|f| range.contains(f.date))
            .cloned()
            .collect()
    }
}

/// Recover the date from names such as `chirps-v2.0.2020.10.29.tif` or `rain_20201029.tif`
pub fn date_from_file_name(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let tail = |n: usize| stem.get(stem.len().checked_sub(n)?..);

    tail(10)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y.%m.%d").ok())
        .or_else(|| tail(8).and_then(|s| NaiveDate::parse_from_str(s, "%Y%m%d").ok()))
}

/// Affine transform from pixel to map coordinates, GDAL ordering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Pixel (column, row) containing a map coordinate, if any
    pub fn pixel_of(&self, x: f64, y: f64, width: u32, height: u32) -> Option<(u32, u32)> {
        let col = ((x - self.origin_x) / self.pixel_width).floor();
        let row = ((y - self.origin_y) / self.pixel_height).floor();

        if col < 0.0 || row < 0.0 || col >= width as f64 || row >= height as f64 {
            return None;
        }
        Some((col as u32, row as u32))
    }
}

enum ChunkLayout {
    Stripped { rows_per_strip: u32 },
    Tiled { tile_width: u32, tile_height: u32, tiles_per_row: u32 },
}

/// Nearest-cell sampler over one single-band GeoTIFF.
///
/// The file is opened once; strips or tiles are decoded on first use and
/// cached, so sampling many points costs one decode per touched chunk.
pub struct GeoTiffSampler {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    width: u32,
    height: u32,
    transform: GeoTransform,
    nodata: Option<f64>,
    layout: ChunkLayout,
    cache: HashMap<u32, (Vec<f64>, u32)>,
}

impl GeoTiffSampler {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let (width, height) = decoder.dimensions()?;
        let transform = read_geo_transform(&mut decoder).map_err(|message| ProcessingError::Raster {
            path: path.to_path_buf(),
            message,
        })?;
        let nodata = decoder
            .find_tag(Tag::from_u16_exhaustive(GDAL_NODATA_TAG))?
            .and_then(|v| v.into_string().ok())
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let layout = if chunk_width == width {
            ChunkLayout::Stripped {
                rows_per_strip: chunk_height,
            }
        } else {
            ChunkLayout::Tiled {
                tile_width: chunk_width,
                tile_height: chunk_height,
                tiles_per_row: width.div_ceil(chunk_width),
            }
        };

        debug!(path = %path.display(), width, height, ?nodata, "opened raster");

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            width,
            height,
            transform,
            nodata,
            layout,
            cache: HashMap::new(),
        })
    }

    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// Cell value under a point; `Missing` outside the raster or on no-data
    pub fn sample(&mut self, longitude: f64, latitude: f64) -> Result<CellValue> {
        let Some((col, row)) = self
            .transform
            .pixel_of(longitude, latitude, self.width, self.height)
        else {
            return Ok(CellValue::Missing);
        };

        let (chunk_index, local_row, local_col) = match self.layout {
            ChunkLayout::Stripped { rows_per_strip } => (row / rows_per_strip, row % rows_per_strip, col),
            ChunkLayout::Tiled {
                tile_width,
                tile_height,
                tiles_per_row,
            } => (
                (row / tile_height) * tiles_per_row + col / tile_width,
                row % tile_height,
                col % tile_width,
            ),
        };

        if !self.cache.contains_key(&chunk_index) {
            let (stride, _) = self.decoder.chunk_data_dimensions(chunk_index);
            let data = decoded_to_f64(self.decoder.read_chunk(chunk_index)?).ok_or_else(|| {
                ProcessingError::Raster {
                    path: self.path.clone(),
                    message: "unsupported sample format".to_string(),
                }
            })?;
            self.cache.insert(chunk_index, (data, stride));
        }

        let (data, stride) = &self.cache[&chunk_index];
        let index = local_row as usize * *stride as usize + local_col as usize;
        Ok(data
            .get(index)
            .map(|v| CellValue::from_pixel(*v, self.nodata))
            .unwrap_or(CellValue::Missing))
    }

    /// Sample every location; read failures become `Missing` for that point
    pub fn sample_locations(&mut self, locations: &[Location]) -> Vec<CellValue> {
        locations
            .iter()
            .map(|location| {
                self.sample(location.longitude, location.latitude)
                    .unwrap_or_else(|e| {
                        warn!(path = %self.path.display(), location = %location.id, error = %e, "raster read failed");
                        CellValue::Missing
                    })
            })
            .collect()
    }
}

fn read_geo_transform(decoder: &mut Decoder<BufReader<File>>) -> std::result::Result<GeoTransform, String> {
    let mut f64_tag = |tag: u16| -> Option<Vec<f64>> {
        decoder
            .find_tag(Tag::from_u16_exhaustive(tag))
            .ok()
            .flatten()
            .and_then(|v| v.into_f64_vec().ok())
    };

    if let Some(m) = f64_tag(MODEL_TRANSFORMATION_TAG).filter(|m| m.len() >= 8) {
        return Ok(GeoTransform {
            origin_x: m[3],
            pixel_width: m[0],
            origin_y: m[7],
            pixel_height: m[5],
        });
    }

    let scale = f64_tag(MODEL_PIXEL_SCALE_TAG).ok_or("missing ModelPixelScale tag")?;
    let tiepoint = f64_tag(MODEL_TIEPOINT_TAG).ok_or("missing ModelTiepoint tag")?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err("malformed georeferencing tags".to_string());
    }
    if scale[0] == 0.0 || scale[1] == 0.0 {
        return Err("zero pixel size".to_string());
    }

    // Tiepoint maps raster (i, j) to model (x, y)
    Ok(GeoTransform {
        origin_x: tiepoint[3] - tiepoint[0] * scale[0],
        pixel_width: scale[0],
        origin_y: tiepoint[4] + tiepoint[1] * scale[1],
        pixel_height: -scale[1],
    })
}

fn decoded_to_f64(result: DecodingResult) -> Option<Vec<f64>> {
    let values = match result {
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        _ => return None,
    };
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiff::encoder::{colortype, TiffEncoder};

    /// 4x3 float raster at 1 degree resolution, upper-left corner at (-90, 15)
    fn write_test_raster(path: &Path, nodata: &str) {
        let data: Vec<f32> = vec![
            0.0, 1.5, 2.0, 3.0, //
            4.0, -9999.0, 6.0, 7.25, //
            8.0, 9.0, -1.0, 11.0,
        ];
        let file = File::create(path).unwrap();
        let mut tiff = TiffEncoder::new(file).unwrap();
        let mut image = tiff.new_image::<colortype::Gray32Float>(4, 3).unwrap();
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG), &[1.0f64, 1.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG), &[0.0f64, 0.0, 0.0, -90.0, 15.0, 0.0][..])
            .unwrap();
        image.encoder().write_tag(Tag::from_u16_exhaustive(GDAL_NODATA_TAG), nodata).unwrap();
        image.write_data(&data).unwrap();
    }

    #[test]
    fn test_date_from_file_name() {
        assert_eq!(
            date_from_file_name(Path::new("/data/chirps-v2.0.2020.10.29.tif")),
            NaiveDate::from_ymd_opt(2020, 10, 29)
        );
        assert_eq!(
            date_from_file_name(Path::new("rain_20210105.tif")),
            NaiveDate::from_ymd_opt(2021, 1, 5)
        );
        assert_eq!(date_from_file_name(Path::new("readme.tif")), None);
    }

    #[test]
    fn test_pixel_lookup() {
        let transform = GeoTransform {
            origin_x: -90.0,
            pixel_width: 0.5,
            origin_y: 15.0,
            pixel_height: -0.5,
        };
        assert_eq!(transform.pixel_of(-89.9, 14.9, 10, 10), Some((0, 0)));
        assert_eq!(transform.pixel_of(-88.6, 13.4, 10, 10), Some((2, 3)));
        assert_eq!(transform.pixel_of(-91.0, 14.0, 10, 10), None);
        assert_eq!(transform.pixel_of(-80.0, 14.0, 10, 10), None);
    }

    #[test]
    fn test_sample_geotiff() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("chirps-v2.0.2020.10.29.tif");
        write_test_raster(&path, "-1");

        let mut sampler = GeoTiffSampler::open(&path)?;
        assert_eq!(sampler.transform().pixel_height, -1.0);

        assert_eq!(sampler.sample(-89.5, 14.5)?, CellValue::Present(0.0));
        assert_eq!(sampler.sample(-86.5, 13.5)?, CellValue::Present(7.25));
        // -9999 sentinel and the file's own no-data value
        assert_eq!(sampler.sample(-88.5, 13.5)?, CellValue::Missing);
        assert_eq!(sampler.sample(-87.5, 12.5)?, CellValue::Missing);
        // Outside the raster
        assert_eq!(sampler.sample(-50.0, 13.5)?, CellValue::Missing);

        Ok(())
    }

    #[test]
    fn test_catalog_scan() -> Result<()> {
        let dir = TempDir::new()?;
        write_test_raster(&dir.path().join("chirps-v2.0.2020.10.30.tif"), "-9999");
        write_test_raster(&dir.path().join("chirps-v2.0.2020.10.29.tif"), "-9999");
        std::fs::write(dir.path().join("notes.txt"), "not a raster")?;
        std::fs::write(dir.path().join("undated.tif"), "ignored")?;

        let catalog = RasterCatalog::scan(dir.path())?;
        let dates: Vec<_> = catalog.files().iter().map(|f| f.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2020, 10, 29).unwrap(),
                NaiveDate::from_ymd_opt(2020, 10, 30).unwrap()
            ]
        );

        let range = DateRange::new(dates[1], dates[1])?;
        assert_eq!(catalog.within(&range).len(), 1);

        Ok(())
    }
}
