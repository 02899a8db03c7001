use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::{DeflateDecoder, MultiGzDecoder};

const MAX_LAYERS: usize = 10;

/// Container layers recognised ahead of the annotation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// GZIP or BGZF (concatenated members).
    Gzip,
    /// PKZIP archive; only the first entry is read.
    Zip,
}

impl Layer {
    pub fn detect(magic: &[u8]) -> Option<Self> {
        match magic {
            [0x1f, 0x8b, ..] => Some(Self::Gzip),
            [0x50, 0x4b, 0x03, 0x04, ..] => Some(Self::Zip),
            _ => None,
        }
    }
}

/// Opens an annotation export, peeling off any GZIP/BGZF or ZIP layers so the
/// caller sees plain text. Nested layers (`.vcf.gz.zip`) are supported.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let mut reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(file));

    for _ in 0..MAX_LAYERS {
        let layer = {
            let buf = reader.fill_buf()?;
            Layer::detect(buf)
        };

        reader = match layer {
            Some(Layer::Gzip) => {
                tracing::debug!(path = %path.display(), "detected GZIP/BGZF layer");
                Box::new(BufReader::new(MultiGzDecoder::new(reader)))
            }
            Some(Layer::Zip) => {
                tracing::debug!(path = %path.display(), "detected ZIP layer");
                Box::new(BufReader::new(first_zip_entry(reader)?))
            }
            None => break,
        };
    }

    Ok(reader)
}

/// Streams the first entry of a ZIP archive from its local file header.
fn first_zip_entry(mut reader: Box<dyn BufRead + Send>) -> io::Result<Box<dyn Read + Send>> {
    let mut header = [0u8; 30];
    reader.read_exact(&mut header)?;

    let flags = u16::from_le_bytes([header[6], header[7]]);
    let method = u16::from_le_bytes([header[8], header[9]]);
    let compressed_size =
        u32::from_le_bytes([header[18], header[19], header[20], header[21]]) as u64;
    let name_len = u16::from_le_bytes([header[26], header[27]]) as u64;
    let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;

    // The stream cannot seek, so the name and extra field are read and dropped.
    io::copy(&mut reader.by_ref().take(name_len + extra_len), &mut io::sink())?;

    match method {
        8 => Ok(Box::new(DeflateDecoder::new(reader))),
        0 if flags & 0x0008 != 0 => {
            tracing::warn!("stored ZIP entry has a trailing data descriptor; reading until EOF");
            Ok(Box::new(reader))
        }
        0 => Ok(Box::new(reader.take(compressed_size))),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported ZIP compression method: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_layers_from_magic_bytes() {
        assert_eq!(Layer::detect(&[0x1f, 0x8b, 0x08]), Some(Layer::Gzip));
        assert_eq!(Layer::detect(b"PK\x03\x04rest"), Some(Layer::Zip));
        assert_eq!(Layer::detect(b"##fileformat=VCFv4.1"), None);
        assert_eq!(Layer::detect(&[0x1f]), None);
        assert_eq!(Layer::detect(&[]), None);
    }

    #[test]
    fn plain_and_gzip_inputs_read_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let text = "##fileformat=VCFv4.1\nGENE=A;AA=p.C1A;SAMPLE_COUNT=1;\n";

        let plain = dir.path().join("plain.vcf");
        std::fs::write(&plain, text).unwrap();

        let gz = dir.path().join("packed.vcf.gz");
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        std::fs::write(&gz, encoder.finish().unwrap()).unwrap();

        for path in [&plain, &gz] {
            let mut out = String::new();
            open_input(path).unwrap().read_to_string(&mut out).unwrap();
            assert_eq!(out, text);
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_input(&dir.path().join("absent.vcf")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
