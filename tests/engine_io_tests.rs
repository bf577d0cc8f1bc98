mod common;

use common::UnionFixture;
use flexfs::operations::{FileAccess, FileMode, FileSystemOperations, Status};
use flexfs::RequestContext;
use std::fs;
use std::thread;

const READ_WRITE: FileAccess = FileAccess::from_bits(0xC000_0000);

#[test]
fn test_positioned_writes_and_reads() {
    let fixture = UnionFixture::new();
    let mut ctx = fixture.open("\\data.bin", READ_WRITE, FileMode::CreateNew);

    assert_eq!(fixture.fs.write_file("\\data.bin", b"hello world", 0, &ctx).unwrap(), 11);
    assert_eq!(fixture.fs.write_file("\\data.bin", b"WORLD", 6, &ctx).unwrap(), 5);

    let mut buffer = [0u8; 32];
    let n = fixture.fs.read_file("\\data.bin", &mut buffer, 0, &ctx).unwrap();
    assert_eq!(&buffer[..n], b"hello WORLD");

    let n = fixture.fs.read_file("\\data.bin", &mut buffer, 100, &ctx).unwrap();
    assert_eq!(n, 0);

    fixture.close("\\data.bin", &mut ctx);
}

#[test]
fn test_read_without_bound_stream() {
    let fixture = UnionFixture::new();
    fs::write(fixture.secondary.join("notes.txt"), b"remember the milk").unwrap();

    let ctx = fixture.open("\\notes.txt", FileAccess::READ_ATTRIBUTES, FileMode::Open);
    assert!(!ctx.has_handle());

    let mut buffer = [0u8; 4];
    let n = fixture.fs.read_file("\\notes.txt", &mut buffer, 9, &ctx).unwrap();
    assert_eq!(&buffer[..n], b"the ");
}

#[test]
fn test_write_through_read_only_stream_reports_disk_full() {
    let fixture = UnionFixture::new();
    fs::write(fixture.primary.join("ro.txt"), b"abc").unwrap();

    let mut ctx = fixture.open("\\ro.txt", FileAccess::GENERIC_READ, FileMode::Open);
    let err = fixture.fs.write_file("\\ro.txt", b"x", 0, &ctx).unwrap_err();
    assert_eq!(err.status(), Status::DiskFull);
    fixture.close("\\ro.txt", &mut ctx);

    assert_eq!(fs::read(fixture.primary.join("ro.txt")).unwrap(), b"abc");
}

#[test]
fn test_set_end_of_file_and_allocation_size() {
    let fixture = UnionFixture::new();
    fs::write(fixture.primary.join("grow.txt"), b"0123456789").unwrap();

    let mut ctx = fixture.open("\\grow.txt", FileAccess::GENERIC_WRITE, FileMode::Open);
    fixture.fs.set_end_of_file("\\grow.txt", 4, &ctx).unwrap();
    fixture.fs.set_allocation_size("\\grow.txt", 6, &ctx).unwrap();
    fixture.fs.flush_file_buffers("\\grow.txt", &ctx).unwrap();
    fixture.close("\\grow.txt", &mut ctx);

    let info = fixture
        .fs
        .get_file_information("\\grow.txt", &RequestContext::new())
        .unwrap();
    assert_eq!(info.length, 6);
    assert_eq!(&fs::read(fixture.primary.join("grow.txt")).unwrap()[..4], b"0123");
}

#[test]
fn test_flush_is_harmless_without_writable_stream() {
    let fixture = UnionFixture::new();
    fs::write(fixture.primary.join("a.txt"), b"abc").unwrap();

    let ctx = fixture.open("\\a.txt", FileAccess::READ_ATTRIBUTES, FileMode::Open);
    fixture.fs.flush_file_buffers("\\a.txt", &ctx).unwrap();

    let ctx = fixture.open("\\a.txt", FileAccess::GENERIC_READ, FileMode::Open);
    fixture.fs.flush_file_buffers("\\a.txt", &ctx).unwrap();
}

#[test]
fn test_byte_range_locks() {
    let fixture = UnionFixture::new();
    fs::write(fixture.primary.join("shared.db"), vec![0u8; 64]).unwrap();

    let mut ctx = fixture.open("\\shared.db", READ_WRITE, FileMode::Open);
    fixture.fs.lock_file("\\shared.db", 0, 16, &ctx).unwrap();
    fixture.fs.unlock_file("\\shared.db", 0, 16, &ctx).unwrap();
    fixture.close("\\shared.db", &mut ctx);

    let unbound = fixture.open("\\shared.db", FileAccess::READ_ATTRIBUTES, FileMode::Open);
    let err = fixture
        .fs
        .lock_file("\\shared.db", 0, 16, &unbound)
        .unwrap_err();
    assert_eq!(err.status(), Status::AccessDenied);
}

#[cfg(target_os = "linux")]
#[test]
fn test_overlapping_locks_conflict_between_handles() {
    let fixture = UnionFixture::new();
    fs::write(fixture.primary.join("db"), vec![0u8; 64]).unwrap();

    let mut first = fixture.open("\\db", READ_WRITE, FileMode::Open);
    let mut second = fixture.open("\\db", READ_WRITE, FileMode::Open);

    fixture.fs.lock_file("\\db", 0, 16, &first).unwrap();
    let err = fixture.fs.lock_file("\\db", 8, 16, &second).unwrap_err();
    assert_eq!(err.status(), Status::AccessDenied);

    // A one-shot read opens and closes its own stream; the lock survives it
    let mut buffer = [0u8; 4];
    fixture
        .fs
        .read_file("\\db", &mut buffer, 0, &RequestContext::new())
        .unwrap();

    let conflict = fixture.fs.test_lock("\\db", 0, 4, &second).unwrap().unwrap();
    assert_eq!((conflict.offset, conflict.length), (0, 16));
    assert!(conflict.exclusive);

    // Querying through the holder reports nothing and leaves the lock in place
    assert_eq!(fixture.fs.test_lock("\\db", 0, 16, &first).unwrap(), None);
    let err = fixture.fs.lock_file("\\db", 0, 16, &second).unwrap_err();
    assert_eq!(err.status(), Status::AccessDenied);

    fixture.fs.unlock_file("\\db", 0, 16, &first).unwrap();
    fixture.fs.lock_file("\\db", 8, 16, &second).unwrap();

    fixture.close("\\db", &mut first);
    fixture.close("\\db", &mut second);
}

#[test]
fn test_concurrent_writes_on_distinct_handles() {
    let fixture = UnionFixture::new();
    const CHUNK: usize = 4096;
    const WRITERS: usize = 8;
    fs::write(fixture.primary.join("big.bin"), vec![0u8; CHUNK * WRITERS]).unwrap();

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let fixture = &fixture;
            scope.spawn(move || {
                let mut ctx = fixture.open("\\big.bin", FileAccess::GENERIC_WRITE, FileMode::Open);
                let chunk = vec![writer as u8 + 1; CHUNK];
                for _ in 0..4 {
                    fixture
                        .fs
                        .write_file("\\big.bin", &chunk, (writer * CHUNK) as u64, &ctx)
                        .unwrap();
                }
                fixture.close("\\big.bin", &mut ctx);
            });
        }
    });

    let contents = fs::read(fixture.primary.join("big.bin")).unwrap();
    assert_eq!(contents.len(), CHUNK * WRITERS);
    for (writer, chunk) in contents.chunks(CHUNK).enumerate() {
        assert!(chunk.iter().all(|b| *b == writer as u8 + 1));
    }
}

#[test]
fn test_concurrent_reads_on_one_handle() {
    let fixture = UnionFixture::new();
    let data: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    fs::write(fixture.primary.join("shared.bin"), &data).unwrap();

    let mut ctx = fixture.open("\\shared.bin", FileAccess::GENERIC_READ, FileMode::Open);
    thread::scope(|scope| {
        for reader in 0..4usize {
            let (fixture, ctx, data) = (&fixture, &ctx, &data);
            scope.spawn(move || {
                for step in 0..16usize {
                    let offset = (reader * 16 + step) * 1000;
                    let mut buffer = [0u8; 100];
                    let n = fixture
                        .fs
                        .read_file("\\shared.bin", &mut buffer, offset as u64, ctx)
                        .unwrap();
                    assert_eq!(&buffer[..n], &data[offset..offset + n]);
                    assert_eq!(n, 100);
                }
            });
        }
    });
    fixture.close("\\shared.bin", &mut ctx);
}
