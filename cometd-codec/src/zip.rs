use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::CodecError;

/// Wraps `data` in a standard gzip container.
#[inline]
pub fn gzip(data: &[u8]) -> Result<Bytes, CodecError> {
    let mut e = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    e.write_all(data)?;
    Ok(Bytes::from(e.finish()?))
}

#[inline]
pub fn gunzip(data: &[u8]) -> Result<Bytes, CodecError> {
    let mut out = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

#[inline]
pub fn gunzip_to_string(data: &[u8]) -> Result<String, CodecError> {
    let bytes = gunzip(data)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::Utf8Error)
}

/// Checks the two gzip magic bytes.
#[inline]
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_container() {
        let json = br#"{"channel":"/a/b","data":"JsonData"}"#;
        let zipped = gzip(json).unwrap();
        assert!(is_gzip(&zipped));
        assert!(!is_gzip(json));
        assert_eq!(gunzip(&zipped).unwrap().as_ref(), json.as_ref());
        assert_eq!(gunzip_to_string(&zipped).unwrap(), r#"{"channel":"/a/b","data":"JsonData"}"#);
    }

    #[test]
    fn test_gunzip_corrupt() {
        let mut zipped = gzip(b"{\"data\":1}").unwrap().to_vec();
        zipped.truncate(6);
        assert!(matches!(gunzip(&zipped), Err(CodecError::Io(_))));
        assert!(matches!(gunzip(b"not gzip at all"), Err(CodecError::Io(_))));
    }
}
