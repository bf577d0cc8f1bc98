mod common;

use common::{UnionFixture, VirtualFixture};
use flexfs::operations::{FileInformation, FileSystemOperations, Status};
use flexfs::RequestContext;
use std::fs;

fn names(entries: &[FileInformation]) -> Vec<&str> {
    entries.iter().map(|e| e.file_name.as_str()).collect()
}

#[test]
fn test_union_listing_prefers_earlier_candidates() {
    let fixture = UnionFixture::new();
    fs::write(fixture.primary.join("a.txt"), b"a").unwrap();
    fs::write(fixture.primary.join("shared.txt"), b"primary").unwrap();
    fs::write(fixture.secondary.join("b.txt"), b"b").unwrap();
    fs::write(fixture.secondary.join("shared.txt"), b"secondary").unwrap();

    let entries = fixture
        .fs
        .find_files("\\", &RequestContext::for_directory())
        .unwrap();

    assert_eq!(names(&entries), vec!["docs", "a.txt", "shared.txt", "b.txt"]);
    let shared = entries.iter().find(|e| e.file_name == "shared.txt").unwrap();
    assert_eq!(shared.length, "primary".len() as u64);
    assert!(entries[0].is_directory());
}

#[test]
fn test_synthetic_entry_beats_physical_entry() {
    let fixture = UnionFixture::new();
    // A plain file in the root candidate shadowed by the \docs key
    fs::write(fixture.secondary.join("docs"), b"not a directory").unwrap();

    let entries = fixture
        .fs
        .find_files("\\", &RequestContext::for_directory())
        .unwrap();

    let docs: Vec<_> = entries.iter().filter(|e| e.file_name == "docs").collect();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].is_directory());
}

#[test]
fn test_listing_with_patterns() {
    let fixture = UnionFixture::new();
    for name in ["a.txt", "b.txt", "readme.md", "ab.txt"] {
        fs::write(fixture.primary.join(name), b"x").unwrap();
    }
    let ctx = RequestContext::for_directory();

    let entries = fixture.fs.find_files_with_pattern("\\", "?.txt", &ctx).unwrap();
    assert_eq!(names(&entries), vec!["a.txt", "b.txt"]);

    let entries = fixture.fs.find_files_with_pattern("\\", "*.MD", &ctx).unwrap();
    assert_eq!(names(&entries), vec!["readme.md"]);

    let entries = fixture.fs.find_files_with_pattern("\\", "d*", &ctx).unwrap();
    assert_eq!(names(&entries), vec!["docs"]);
}

#[test]
fn test_nested_listing_merges_candidates() {
    let fixture = UnionFixture::new();
    fs::create_dir_all(fixture.primary.join("src")).unwrap();
    fs::create_dir_all(fixture.secondary.join("src")).unwrap();
    fs::write(fixture.primary.join("src").join("main.rs"), b"fn main() {}").unwrap();
    fs::write(fixture.secondary.join("src").join("lib.rs"), b"").unwrap();

    let entries = fixture
        .fs
        .find_files("\\src", &RequestContext::for_directory())
        .unwrap();
    assert_eq!(names(&entries), vec!["main.rs", "lib.rs"]);
}

#[test]
fn test_virtual_root_lists_reachable_keys() {
    let fixture = VirtualFixture::new();
    let ctx = RequestContext::for_directory();

    let entries = fixture.fs.find_files("\\", &ctx).unwrap();
    assert_eq!(names(&entries), vec!["media", "music"]);
    assert!(entries.iter().all(|e| e.is_directory()));

    fs::write(fixture.photos.join("cat.jpg"), b"jpeg").unwrap();
    let entries = fixture.fs.find_files("\\media", &ctx).unwrap();
    assert_eq!(names(&entries), vec!["photos"]);

    let entries = fixture.fs.find_files("\\media\\photos", &ctx).unwrap();
    assert_eq!(names(&entries), vec!["cat.jpg"]);
}

#[test]
fn test_listing_unmapped_directory_fails() {
    let fixture = VirtualFixture::new();
    let err = fixture
        .fs
        .find_files("\\elsewhere", &RequestContext::for_directory())
        .unwrap_err();
    assert_eq!(err.status(), Status::PathNotMapped);
}

#[test]
fn test_missing_candidates_are_skipped() {
    let fixture = UnionFixture::new();
    fs::remove_dir_all(&fixture.secondary).unwrap();
    fs::write(fixture.primary.join("only.txt"), b"x").unwrap();

    let entries = fixture
        .fs
        .find_files("\\", &RequestContext::for_directory())
        .unwrap();
    assert_eq!(names(&entries), vec!["docs", "only.txt"]);
}
