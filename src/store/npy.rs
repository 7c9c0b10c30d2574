//! NPY codec for 2-D float arrays.
//!
//! The persisted vector and coordinate files interoperate with NumPy's
//! `np.save`/`np.load`, so the on-disk format is NPY. The writer always emits
//! version 1.0, little-endian `<f4`, C order. The reader additionally accepts
//! `<f8` (files saved from Python default to float64) and version 2.0 headers.

use ndarray::Array2;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Serialize a 2-D array as NPY v1.0 bytes (`<f4`, C order).
pub fn encode(array: &Array2<f32>) -> Vec<u8> {
    let (rows, cols) = array.dim();
    let mut header =
        format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");

    // Total preamble (magic + version + u16 length + header incl. newline)
    // must be a multiple of 64 for aligned mmap loads.
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let pad = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(pad));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + rows * cols * 4);
    out.extend_from_slice(MAGIC);
    out.push(1);
    out.push(0);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for &v in array.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parse NPY bytes into a 2-D `f32` array.
///
/// Errors are returned as plain reasons; the caller attaches the file path.
pub fn decode(bytes: &[u8]) -> Result<Array2<f32>, String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("not an NPY file (bad magic)".into());
    }

    let major = bytes[6];
    let (header_start, header_len) = match major {
        1 => (10, u16::from_le_bytes([bytes[8], bytes[9]]) as usize),
        2 => {
            if bytes.len() < 12 {
                return Err("truncated NPY v2 header".into());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
            (12, len)
        }
        other => return Err(format!("unsupported NPY version {other}")),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err("truncated NPY header".into());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| "NPY header is not valid UTF-8".to_string())?;

    if header.contains("'fortran_order': True") {
        return Err("fortran_order arrays are not supported".into());
    }

    let descr = quoted_value(header, "descr")
        .ok_or_else(|| "NPY header missing 'descr'".to_string())?;
    let item_size = match descr {
        "<f4" => 4,
        "<f8" => 8,
        other => return Err(format!("unsupported dtype {other:?} (expected <f4 or <f8)")),
    };

    let shape = tuple_value(header, "shape")
        .ok_or_else(|| "NPY header missing 'shape'".to_string())?;
    let dims: Vec<usize> = shape
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("bad shape entry {s:?}")))
        .collect::<Result<_, _>>()?;
    if dims.len() != 2 {
        return Err(format!("expected a 2-D array, got {}-D shape ({shape})", dims.len()));
    }
    let (rows, cols) = (dims[0], dims[1]);

    let data = &bytes[data_start..];
    let expected = rows * cols * item_size;
    if data.len() < expected {
        return Err(format!(
            "data section too short: {} bytes, expected {expected}",
            data.len()
        ));
    }

    let values: Vec<f32> = match item_size {
        4 => data[..expected]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        _ => data[..expected]
            .chunks_exact(8)
            .map(|c| {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32
            })
            .collect(),
    };

    Array2::from_shape_vec((rows, cols), values).map_err(|e| e.to_string())
}

/// Extract a `'key': 'value'` string field from the header dict.
fn quoted_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = field_rest(header, key)?;
    let rest = rest.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

/// Extract a `'key': (a, b)` tuple field, returning the text between parens.
fn tuple_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = field_rest(header, key)?;
    let rest = rest.strip_prefix('(')?;
    let end = rest.find(')')?;
    Some(&rest[..end])
}

fn field_rest<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pat = format!("'{key}':");
    let at = header.find(&pat)? + pat.len();
    Some(header[at..].trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn roundtrip_is_bit_exact() {
        let a = array![[0.1f32, 0.2, -3.5], [4.0, 5.25, f32::MIN_POSITIVE]];
        let decoded = decode(&encode(&a)).unwrap();
        assert_eq!(decoded, a);
    }

    #[test]
    fn preamble_is_64_byte_aligned() {
        let a = Array2::<f32>::zeros((3, 384));
        let bytes = encode(&a);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
    }

    #[test]
    fn decodes_f8_arrays() {
        // Hand-built v1.0 header with float64 data, as np.save writes for
        // a Python list of lists.
        let mut header =
            String::from("{'descr': '<f8', 'fortran_order': False, 'shape': (1, 2), }");
        let pad = (64 - (10 + header.len() + 1) % 64) % 64;
        header.push_str(&" ".repeat(pad));
        header.push('\n');

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x93NUMPY\x01\x00");
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&0.5f64.to_le_bytes());
        bytes.extend_from_slice(&(-2.0f64).to_le_bytes());

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, array![[0.5f32, -2.0]]);
    }

    #[test]
    fn rejects_fortran_order() {
        let a = array![[1.0f32, 2.0]];
        let bytes = encode(&a);
        let tampered = String::from_utf8(bytes)
            .map(|s| s.replace("'fortran_order': False", "'fortran_order': True "))
            .unwrap();
        let err = decode(tampered.as_bytes()).unwrap_err();
        assert!(err.contains("fortran_order"));
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(decode(b"not an npy file at all").is_err());
    }

    #[test]
    fn rejects_one_dimensional_shape() {
        let mut header =
            String::from("{'descr': '<f4', 'fortran_order': False, 'shape': (4,), }");
        let pad = (64 - (10 + header.len() + 1) % 64) % 64;
        header.push_str(&" ".repeat(pad));
        header.push('\n');

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x93NUMPY\x01\x00");
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 16]);

        let err = decode(&bytes).unwrap_err();
        assert!(err.contains("2-D"), "{err}");
    }
}
