//! Looks for explicit rights markers embedded in image metadata.
//!
//! Covers EXIF `Copyright` (JPEG APP1 and bare TIFF), IPTC copyright notices
//! (JPEG APP13), PNG text chunks and XMP packets in any container. Anything
//! not written into those fields goes unnoticed.

const EXIF_COPYRIGHT: u16 = 0x8298;
const EXIF_IFD_POINTER: u16 = 0x8769;
const TIFF_ASCII: u16 = 2;

const XMP_OPEN: &[u8] = b"<x:xmpmeta";
const XMP_CLOSE: &[u8] = b"</x:xmpmeta>";
const XMP_RIGHTS_FIELDS: &[&str] = &["dc:rights", "xmprights:", "copyright"];

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Name of the first metadata field that marks the image as rights-managed.
pub fn find_rights_marker(bytes: &[u8]) -> Option<String> {
    let marker = if bytes.starts_with(&[0xFF, 0xD8]) {
        scan_jpeg(bytes)
    } else if bytes.starts_with(PNG_SIGNATURE) {
        scan_png(bytes)
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Tiff::new(bytes).and_then(|tiff| tiff.copyright()).map(|_| "EXIF Copyright".to_string())
    } else {
        None
    };

    marker.or_else(|| scan_xmp(bytes))
}

fn scan_jpeg(bytes: &[u8]) -> Option<String> {
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            // start of scan or end of image: no more metadata segments
            0xDA | 0xD9 => return None,
            _ => {}
        }

        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if len < 2 {
            return None;
        }
        let end = (pos + 2 + len).min(bytes.len());
        let data = &bytes[pos + 4..end];

        match marker {
            0xE1 if data.starts_with(b"Exif\0\0") => {
                if Tiff::new(&data[6..]).and_then(|tiff| tiff.copyright()).is_some() {
                    return Some("EXIF Copyright".to_string());
                }
            }
            0xED if data.starts_with(b"Photoshop 3.0\0") => {
                if has_iptc_copyright(data) {
                    return Some("IPTC Copyright Notice".to_string());
                }
            }
            _ => {}
        }

        pos = end;
    }
    None
}

/// IPTC dataset 2:116 is the copyright notice.
fn has_iptc_copyright(data: &[u8]) -> bool {
    data.windows(5).any(|w| {
        w[0] == 0x1C && w[1] == 0x02 && w[2] == 0x74 && u16::from_be_bytes([w[3], w[4]]) > 0
    })
}

fn scan_png(bytes: &[u8]) -> Option<String> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]]) as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let start = pos + 8;
        let end = start.checked_add(len)?.min(bytes.len());
        let data = &bytes[start..end];

        match kind {
            b"IEND" => return None,
            b"tEXt" | b"iTXt" | b"zTXt" => {
                let keyword_len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                let keyword = String::from_utf8_lossy(&data[..keyword_len]).to_lowercase();
                if keyword.contains("copyright") || keyword.contains("rights") {
                    return Some(format!(
                        "PNG {} {}",
                        String::from_utf8_lossy(kind),
                        String::from_utf8_lossy(&data[..keyword_len])
                    ));
                }
            }
            _ => {}
        }

        // chunk data is followed by a 4 byte CRC
        pos = end.checked_add(4)?;
    }
    None
}

fn scan_xmp(bytes: &[u8]) -> Option<String> {
    let start = find(bytes, XMP_OPEN)?;
    let end = find(&bytes[start..], XMP_CLOSE).map_or(bytes.len(), |i| start + i + XMP_CLOSE.len());
    let packet = String::from_utf8_lossy(&bytes[start..end]).to_lowercase();

    XMP_RIGHTS_FIELDS
        .iter()
        .find(|field| packet.contains(*field))
        .map(|field| format!("XMP {}", field.trim_end_matches(':')))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

struct Tiff<'a> {
    data: &'a [u8],
    little_endian: bool,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let little_endian = match data.get(..2)? {
            b"II" => true,
            b"MM" => false,
            _ => return None,
        };
        let tiff = Self { data, little_endian };
        (tiff.u16_at(2)? == 42).then_some(tiff)
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset.checked_add(2)?)?;
        Some(if self.little_endian {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset.checked_add(4)?)?;
        Some(if self.little_endian {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    /// Non-blank Copyright value from IFD0 or the EXIF sub-IFD
    fn copyright(&self) -> Option<String> {
        let ifd0 = self.u32_at(4)? as usize;
        let mut pending = vec![ifd0];
        let mut visited = Vec::new();

        while let Some(ifd) = pending.pop() {
            if visited.contains(&ifd) || visited.len() >= 4 {
                continue;
            }
            visited.push(ifd);

            let count = self.u16_at(ifd)? as usize;
            for i in 0..count {
                let entry = ifd + 2 + i * 12;
                let tag = self.u16_at(entry)?;
                match tag {
                    EXIF_COPYRIGHT => {
                        if let Some(value) = self.ascii_value(entry) {
                            return Some(value);
                        }
                    }
                    EXIF_IFD_POINTER => pending.push(self.u32_at(entry + 8)? as usize),
                    _ => {}
                }
            }
        }
        None
    }

    fn ascii_value(&self, entry: usize) -> Option<String> {
        if self.u16_at(entry + 2)? != TIFF_ASCII {
            return None;
        }
        let count = self.u32_at(entry + 4)? as usize;
        let start = if count <= 4 { entry + 8 } else { self.u32_at(entry + 8)? as usize };
        let raw = self.data.get(start..start.checked_add(count)?)?;
        let value = String::from_utf8_lossy(raw)
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string();
        (!value.is_empty()).then_some(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Little-endian TIFF with one IFD0 entry: Copyright = `value`.
    pub(crate) fn tiff_with_copyright(value: &str) -> Vec<u8> {
        let mut ascii = value.as_bytes().to_vec();
        ascii.push(0);

        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&EXIF_COPYRIGHT.to_le_bytes());
        tiff.extend_from_slice(&TIFF_ASCII.to_le_bytes());
        tiff.extend_from_slice(&(ascii.len() as u32).to_le_bytes());
        if ascii.len() <= 4 {
            ascii.resize(4, 0);
            tiff.extend_from_slice(&ascii);
            tiff.extend_from_slice(&0u32.to_le_bytes());
        } else {
            // header (8) + count (2) + entry (12) + next IFD (4)
            tiff.extend_from_slice(&26u32.to_le_bytes());
            tiff.extend_from_slice(&0u32.to_le_bytes());
            tiff.extend_from_slice(&ascii);
        }
        tiff
    }

    pub(crate) fn jpeg_with_segments(segments: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];
        for (marker, payload) in segments {
            jpeg.extend_from_slice(&[0xFF, *marker]);
            jpeg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
            jpeg.extend_from_slice(payload);
        }
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);
        jpeg
    }

    fn png_with_chunks(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut png = PNG_SIGNATURE.to_vec();
        for (kind, data) in chunks {
            png.extend_from_slice(&(data.len() as u32).to_be_bytes());
            png.extend_from_slice(*kind);
            png.extend_from_slice(data);
            png.extend_from_slice(&[0, 0, 0, 0]);
        }
        png
    }

    #[test]
    fn test_plain_jpeg_has_no_marker() {
        let jpeg = jpeg_with_segments(&[(0xE0, b"JFIF\0\x01\x02".to_vec())]);
        assert_eq!(find_rights_marker(&jpeg), None);
    }

    #[test]
    fn test_jpeg_exif_copyright() {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend(tiff_with_copyright("(c) Example Photo Agency"));
        let jpeg = jpeg_with_segments(&[(0xE0, b"JFIF\0".to_vec()), (0xE1, payload)]);
        assert_eq!(find_rights_marker(&jpeg).as_deref(), Some("EXIF Copyright"));
    }

    #[test]
    fn test_blank_exif_copyright_is_ignored() {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend(tiff_with_copyright("   "));
        let jpeg = jpeg_with_segments(&[(0xE1, payload)]);
        assert_eq!(find_rights_marker(&jpeg), None);
    }

    #[test]
    fn test_bare_tiff_copyright() {
        let tiff = tiff_with_copyright("Jane Doe");
        assert_eq!(find_rights_marker(&tiff).as_deref(), Some("EXIF Copyright"));
    }

    #[test]
    fn test_jpeg_iptc_copyright() {
        let mut payload = b"Photoshop 3.0\08BIM\x04\x04\0\0\0\0\0\x10".to_vec();
        payload.extend_from_slice(&[0x1C, 0x02, 0x74, 0x00, 0x05]);
        payload.extend_from_slice(b"Agncy");
        let jpeg = jpeg_with_segments(&[(0xED, payload)]);
        assert_eq!(find_rights_marker(&jpeg).as_deref(), Some("IPTC Copyright Notice"));
    }

    #[test]
    fn test_xmp_rights() {
        let mut payload = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
        payload.extend_from_slice(
            b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><rdf:RDF><dc:rights>All rights reserved</dc:rights></rdf:RDF></x:xmpmeta>",
        );
        let jpeg = jpeg_with_segments(&[(0xE1, payload)]);
        assert_eq!(find_rights_marker(&jpeg).as_deref(), Some("XMP dc:rights"));
    }

    #[test]
    fn test_png_text_chunks() {
        let plain = png_with_chunks(&[(b"tEXt", b"Software\0GIMP".to_vec()), (b"IEND", vec![])]);
        assert_eq!(find_rights_marker(&plain), None);

        let marked = png_with_chunks(&[(b"tEXt", b"Copyright\0Example".to_vec()), (b"IEND", vec![])]);
        assert_eq!(find_rights_marker(&marked).as_deref(), Some("PNG tEXt Copyright"));
    }

    #[test]
    fn test_truncated_input_does_not_panic() {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend(tiff_with_copyright("Someone"));
        let jpeg = jpeg_with_segments(&[(0xE1, payload)]);
        for len in 0..jpeg.len() {
            let _ = find_rights_marker(&jpeg[..len]);
        }
        assert_eq!(find_rights_marker(b"GIF89a"), None);
    }
}
