use std::fs;
use std::path::{Path, PathBuf};

use flexfs::operations::{CreateRequest, FileAccess, FileMode, FileSystemOperations};
use flexfs::{parse_mapping, FlexFs, RequestContext};
use tempfile::TempDir;

/// Get the path to the flexfs binary for testing.
#[allow(dead_code)]
pub fn get_flexfs_path() -> PathBuf {
    assert_cmd::cargo::cargo_bin!("flexfs").to_path_buf()
}

/// A union volume over fresh temporary directories:
///
/// ```text
/// \docs > docs/
/// \     > primary/ | secondary/
/// ```
#[allow(dead_code)]
pub struct UnionFixture {
    pub temp_dir: TempDir,
    pub primary: PathBuf,
    pub secondary: PathBuf,
    pub docs: PathBuf,
    pub fs: FlexFs,
}

#[allow(dead_code)]
impl UnionFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let primary = make_dir(temp_dir.path(), "primary");
        let secondary = make_dir(temp_dir.path(), "secondary");
        let docs = make_dir(temp_dir.path(), "docs");

        let text = format!(
            "\\docs > {}\n\\ > {} | {}\n",
            docs.display(),
            primary.display(),
            secondary.display()
        );
        let table = parse_mapping(&text).expect("Failed to parse fixture mapping");

        UnionFixture {
            temp_dir,
            primary,
            secondary,
            docs,
            fs: FlexFs::new(table),
        }
    }

    /// Open `logical` and return its context, panicking on failure.
    pub fn open(&self, logical: &str, access: FileAccess, mode: FileMode) -> RequestContext {
        let mut ctx = RequestContext::new();
        self.fs
            .create_file(logical, &CreateRequest::new(access, mode), &mut ctx)
            .unwrap_or_else(|e| panic!("open {} failed: {}", logical, e));
        ctx
    }

    /// Cleanup then Close, the way a host ends every open.
    pub fn close(&self, logical: &str, ctx: &mut RequestContext) {
        self.fs.cleanup(logical, ctx).expect("cleanup failed");
        self.fs.close_file(logical, ctx).expect("close failed");
    }
}

/// A volume with no root rule, so its root and `\media` are virtual:
///
/// ```text
/// \media\photos > photos/
/// \music        > music/
/// ```
#[allow(dead_code)]
pub struct VirtualFixture {
    pub temp_dir: TempDir,
    pub photos: PathBuf,
    pub music: PathBuf,
    pub fs: FlexFs,
}

#[allow(dead_code)]
impl VirtualFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let photos = make_dir(temp_dir.path(), "photos");
        let music = make_dir(temp_dir.path(), "music");

        let text = format!(
            "\\media\\photos > {}\n\\music > {}\n",
            photos.display(),
            music.display()
        );
        let table = parse_mapping(&text).expect("Failed to parse fixture mapping");

        VirtualFixture {
            temp_dir,
            photos,
            music,
            fs: FlexFs::new(table),
        }
    }
}

#[allow(dead_code)]
fn make_dir(base: &Path, name: &str) -> PathBuf {
    let dir = base.join(name);
    fs::create_dir_all(&dir).expect("Failed to create fixture dir");
    dir
}
