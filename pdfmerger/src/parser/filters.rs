//! Stream filters.
//!
//! Only what the merge engine itself has to look inside is decoded here:
//! object streams and cross-reference streams, which in practice are always
//! `FlateDecode`, optionally with a PNG or TIFF predictor. Page content is copied
//! without decoding.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{PdfMergeError, Result};
use crate::object::{Dictionary, Object, Stream};

/// Decode a stream's content according to its `/Filter` and `/DecodeParms`.
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    let filters = filter_names(&stream.dict)?;
    let params = decode_params(&stream.dict, filters.len());

    let mut data = stream.content.clone();
    for (filter, params) in filters.iter().zip(params) {
        data = match filter.as_slice() {
            b"FlateDecode" | b"Fl" => {
                let inflated = flate_decode(&data)?;
                apply_predictor(inflated, params.as_ref())?
            }
            other => {
                return Err(PdfMergeError::malformed_object(format!(
                    "unsupported filter /{}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
    }
    Ok(data)
}

fn filter_names(dict: &Dictionary) -> Result<Vec<Vec<u8>>> {
    match dict.get(b"Filter") {
        None | Some(Object::Null) => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![name.clone()]),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name()
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| PdfMergeError::malformed_object("filter entry is not a name"))
            })
            .collect(),
        Some(other) => Err(PdfMergeError::malformed_object(format!(
            "/Filter must be a name or array, found {}",
            other.kind()
        ))),
    }
}

fn decode_params(dict: &Dictionary, count: usize) -> Vec<Option<Dictionary>> {
    let mut params = match dict.get(b"DecodeParms") {
        Some(Object::Dictionary(d)) => vec![Some(d.clone())],
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| match item {
                Object::Dictionary(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    params.resize(count, None);
    params
}

/// Inflate zlib data.
///
/// Truncated or corrupt tails are tolerated as long as some output was
/// produced before the error.
pub fn flate_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(input);
    let mut output = Vec::new();
    match decoder.read_to_end(&mut output) {
        Ok(_) => Ok(output),
        Err(_) if !output.is_empty() => {
            tracing::debug!(bytes = output.len(), "partial FlateDecode recovery");
            Ok(output)
        }
        Err(e) => Err(PdfMergeError::malformed_object(format!(
            "FlateDecode failed: {e}"
        ))),
    }
}

/// Deflate data into a zlib stream.
pub fn flate_encode(input: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(input.len() / 2), level);
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

fn apply_predictor(data: Vec<u8>, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    let Some(params) = params else {
        return Ok(data);
    };
    let predictor = params.get_integer(b"Predictor").unwrap_or(1);
    if predictor != 2 && predictor < 10 {
        return Ok(data);
    }

    let columns = positive(params, b"Columns", 1);
    let colors = positive(params, b"Colors", 1);
    let bits = positive(params, b"BitsPerComponent", 8);
    if predictor == 2 {
        apply_tiff_predictor(data, columns, colors, bits)
    } else {
        apply_png_predictor(&data, columns, colors, bits)
    }
}

fn positive(params: &Dictionary, key: &[u8], default: usize) -> usize {
    params
        .get_integer(key)
        .and_then(|v| usize::try_from(v).ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}

/// Bytes per row and bytes per pixel, or an error when the row would not
/// fit in `available` bytes.
fn row_layout(
    columns: usize,
    colors: usize,
    bits_per_component: usize,
    available: usize,
) -> Result<(usize, usize)> {
    let too_large = || {
        PdfMergeError::malformed_object(format!(
            "predictor row of {columns} columns x {colors} colors x {bits_per_component} bits exceeds the {available}-byte stream"
        ))
    };
    let pixel_bits = colors
        .checked_mul(bits_per_component)
        .ok_or_else(too_large)?;
    let row_bytes = columns
        .checked_mul(pixel_bits)
        .ok_or_else(too_large)?
        .div_ceil(8);
    if row_bytes > available {
        return Err(too_large());
    }
    Ok((row_bytes, pixel_bits.div_ceil(8).max(1)))
}

/// Undo TIFF predictor 2 for 8-bit components.
pub fn apply_tiff_predictor(
    mut data: Vec<u8>,
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Result<Vec<u8>> {
    if bits_per_component != 8 {
        return Err(PdfMergeError::malformed_object(format!(
            "TIFF predictor with {bits_per_component} bits per component is not supported"
        )));
    }
    if data.is_empty() {
        return Ok(data);
    }
    let (row_bytes, bpp) = row_layout(columns, colors, bits_per_component, data.len())?;

    for row in data.chunks_mut(row_bytes) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(data)
}

/// Undo PNG row filters (None, Sub, Up, Average, Paeth).
pub fn apply_png_predictor(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    // One filter-type byte precedes each row.
    let (row_bytes, bpp) = row_layout(columns, colors, bits_per_component, data.len() - 1)?;
    let row_size = row_bytes + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    let mut current_row = vec![0u8; row_bytes];

    for row in data.chunks(row_size) {
        if row.len() < row_size {
            // Incomplete trailing row
            break;
        }
        let filter_type = row[0];
        let row_data = &row[1..];

        for i in 0..row_bytes {
            let left = if i >= bpp { current_row[i - bpp] } else { 0 };
            let above = prev_row[i];
            let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let predicted = match filter_type {
                0 => 0,
                1 => left,
                2 => above,
                3 => ((u16::from(left) + u16::from(above)) / 2) as u8,
                4 => paeth(left, above, upper_left),
                other => {
                    return Err(PdfMergeError::malformed_object(format!(
                        "invalid PNG filter type {other}"
                    )));
                }
            };
            current_row[i] = row_data[i].wrapping_add(predicted);
        }

        result.extend_from_slice(&current_row);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    Ok(result)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
