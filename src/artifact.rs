//! Local QR code artifacts.
//!
//! The generator encodes a request's content, rasterizes it and persists the PNG under a
//! scratch directory. Files are named by request id, so concurrent requests with distinct ids
//! never touch the same path and need no coordination. Artifacts are left on disk after
//! publishing; cleaning up the scratch directory is an operational concern.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info_span};

use crate::error::{Error, Result};
use crate::helper::{rasterize, write_png, QUIET_ZONE};
use crate::qrcode::QrCode;
use crate::request::GenerationRequest;

/// A QR code image written to local scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    pub local_path: PathBuf,
    pub byte_size: u64,
}

/// Turns requests into PNG files under one scratch directory.
#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    scratch_dir: PathBuf,
}

impl ArtifactGenerator {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Where the artifact for `id` lives.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.scratch_dir.join(format!("{id}.png"))
    }

    /// Encodes, rasterizes and writes the request's image.
    ///
    /// Encoding happens before anything touches the filesystem, so content that does not fit
    /// leaves no trace. An existing file for the same id is overwritten.
    pub fn generate(&self, request: &GenerationRequest) -> Result<Artifact> {
        let span = info_span!("artifact", id = request.id());
        let _guard = span.enter();

        let qr = QrCode::encode_text(request.content(), request.recovery_level().ecc()).map_err(
            |source| Error::Encoding {
                id: request.id().to_string(),
                source,
            },
        )?;
        debug!(
            version = qr.version().value(),
            mask = qr.mask().value(),
            level = %request.recovery_level(),
            "encoded"
        );

        let img = rasterize(&qr, request.size(), QUIET_ZONE);

        fs::create_dir_all(&self.scratch_dir)
            .map_err(|e| Error::io("creating scratch dir", &self.scratch_dir, e))?;

        let path = self.path_for(request.id());
        write_file(&img, &path)?;

        let byte_size = fs::metadata(&path)
            .map_err(|e| Error::io("reading metadata of", &path, e))?
            .len();
        debug!(path = %path.display(), byte_size, "artifact written");

        Ok(Artifact {
            id: request.id().to_string(),
            local_path: path,
            byte_size,
        })
    }
}

/// Writes the PNG through a buffered handle that is flushed and closed before returning.
fn write_file(img: &image::GrayImage, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io("creating", path, e))?;
    let mut writer = BufWriter::new(file);
    write_png(img, &mut writer).map_err(|e| Error::io("encoding", path, into_io(e)))?;
    writer.flush().map_err(|e| Error::io("writing", path, e))
}

fn into_io(err: image::ImageError) -> io::Error {
    match err {
        image::ImageError::IoError(e) => e,
        other => io::Error::other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, content: &str, size: i64, level: &str) -> GenerationRequest {
        GenerationRequest::new(id, content, size, level).unwrap()
    }

    #[test]
    fn writes_png_named_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("nested").join("generated");
        let generator = ArtifactGenerator::new(&scratch);

        let artifact = generator
            .generate(&request("abc123", "hello-world", 10, "L0"))
            .unwrap();

        assert_eq!(artifact.id, "abc123");
        assert_eq!(artifact.local_path, scratch.join("abc123.png"));
        let on_disk = fs::read(&artifact.local_path).unwrap();
        assert_eq!(on_disk.len() as u64, artifact.byte_size);
        assert_eq!(&on_disk[..4], b"\x89PNG");

        let img = image::load_from_memory(&on_disk).unwrap().to_luma8();
        // "hello-world" is byte mode, version 1: (21 + 8) modules at 10 px.
        assert_eq!(img.dimensions(), (290, 290));
    }

    #[test]
    fn image_decodes_back_to_content() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ArtifactGenerator::new(dir.path());
        let content = "https://example.com/q?id=42&lang=en";

        let artifact = generator
            .generate(&request("roundtrip", content, 3, "L3"))
            .unwrap();

        let img = image::open(&artifact.local_path).unwrap().to_luma8();
        let (w, h) = img.dimensions();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            w as usize,
            h as usize,
            |x, y| img.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1);
        let (_meta, decoded) = grids[0].decode().unwrap();
        assert_eq!(decoded, content);
    }

    #[test]
    fn oversized_content_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("generated");
        let generator = ArtifactGenerator::new(&scratch);
        let content = "x".repeat(3000);

        let err = generator
            .generate(&request("big", &content, 1, "L0"))
            .unwrap_err();

        assert!(matches!(err, Error::Encoding { ref id, .. } if id == "big"));
        assert!(!scratch.exists());
    }

    #[test]
    fn unwritable_scratch_dir_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        let generator = ArtifactGenerator::new(blocker.join("generated"));

        let err = generator
            .generate(&request("a", "b", 1, "L0"))
            .unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn concurrent_requests_never_share_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ArtifactGenerator::new(dir.path());

        let artifacts: Vec<Artifact> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let generator = &generator;
                    s.spawn(move || {
                        generator
                            .generate(&request(&format!("req-{i}"), &format!("payload {i}"), 2, "L1"))
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut paths: Vec<_> = artifacts.iter().map(|a| a.local_path.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
        assert!(paths.iter().all(|p| p.is_file()));
    }
}
