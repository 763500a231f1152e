use log::info;
use shared::ImageExtension;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("Invalid file format")]
    InvalidFormat,
    #[error("File larger than {0} bytes")]
    FileTooLarge(usize),
    #[error("Staging IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reduces an uploaded file name to `[A-Za-z0-9_.-]` with no directory parts.
///
/// Path separators and whitespace collapse into `_`; leading and trailing
/// `.`/`_` are removed, so `../../etc/passwd` becomes `etc_passwd`.
pub fn secure_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Sanitized storage name that still ends in an allowed extension.
pub fn staged_name(filename: &str, extension: ImageExtension) -> String {
    let secured = secure_filename(filename);
    if ImageExtension::from_filename(&secured) == Some(extension) {
        secured
    } else {
        format!("upload.{}", extension)
    }
}

#[derive(Clone)]
pub struct StagingArea {
    root: PathBuf,
    max_size: usize,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn validate_image_size(&self, image_data: &[u8]) -> Result<(), StagingError> {
        if image_data.len() > self.max_size {
            return Err(StagingError::FileTooLarge(self.max_size));
        }
        Ok(())
    }

    /// Writes the upload to `<root>/<run_id>/<sanitized name>`, replacing any file already there.
    pub async fn stage(
        &self,
        run_id: Uuid,
        filename: &str,
        image_data: &[u8],
    ) -> Result<PathBuf, StagingError> {
        let extension = ImageExtension::from_filename(filename).ok_or(StagingError::InvalidFormat)?;
        self.validate_image_size(image_data)?;

        let run_dir = self.root.join(run_id.to_string());
        tokio::fs::create_dir_all(&run_dir).await?;
        let file_path = run_dir.join(staged_name(filename, extension));
        tokio::fs::write(&file_path, image_data).await?;

        info!("File saved to: {}", file_path.display());
        Ok(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn secure_filename_strips_traversal() {
        assert_eq!(secure_filename("../../etc/passwd.jpg"), "etc_passwd.jpg");
        assert_eq!(secure_filename("..\\..\\win.png"), "win.png");
        assert_eq!(secure_filename("/abs/path/x.gif"), "abs_path_x.gif");
    }

    #[test]
    fn secure_filename_drops_unsafe_characters() {
        assert_eq!(secure_filename("my cool photo.jpg"), "my_cool_photo.jpg");
        assert_eq!(secure_filename("a$b%c;rm -rf.png"), "abcrm_-rf.png");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn staged_name_keeps_extension() {
        assert_eq!(staged_name("Carrot.JPEG", ImageExtension::Jpeg), "Carrot.JPEG");
        assert_eq!(staged_name("당근.jpg", ImageExtension::Jpg), "upload.jpg");
        assert_eq!(staged_name("../.png", ImageExtension::Png), "upload.png");
    }

    #[actix_web::test]
    async fn stage_writes_inside_run_directory() {
        let dir = TempDir::new().unwrap();
        let staging = StagingArea::new(dir.path(), 1024);
        let run_id = Uuid::new_v4();

        let path = staging.stage(run_id, "../../escape.jpg", b"bytes").await.unwrap();
        assert_eq!(path, dir.path().join(run_id.to_string()).join("escape.jpg"));
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
    }

    #[actix_web::test]
    async fn stage_overwrites_same_name() {
        let dir = TempDir::new().unwrap();
        let staging = StagingArea::new(dir.path(), 1024);
        let run_id = Uuid::new_v4();

        staging.stage(run_id, "a.png", b"first").await.unwrap();
        let path = staging.stage(run_id, "a.png", b"second").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[actix_web::test]
    async fn stage_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let staging = StagingArea::new(dir.path(), 4);

        let err = staging.stage(Uuid::new_v4(), "notes.txt", b"x").await.unwrap_err();
        assert!(matches!(err, StagingError::InvalidFormat));
        let err = staging.stage(Uuid::new_v4(), "big.jpg", b"12345").await.unwrap_err();
        assert!(matches!(err, StagingError::FileTooLarge(4)));
    }
}
