//! Archives driven through the registry: member addressing, overlay
//! priority against other sources, and nested archive resolution.

use std::sync::Arc;

use canopyfs_core::{read_all, CaseMode, DirExt, DirHandle, DirNode, MemDir, MemFile, VfsRoot};
use canopyfs_zip::ZipLoader;

#[path = "../src/test_util.rs"]
mod test_util;
use test_util::build_zip;

fn vfs_with_archive(name: &str, data: Vec<u8>) -> VfsRoot {
    let mut vfs = VfsRoot::new(CaseMode::Sensitive);
    vfs.add_archive_loader(Arc::new(ZipLoader::new(CaseMode::Sensitive)));
    let base: DirHandle = Arc::new(MemDir::new("", CaseMode::Sensitive));
    base.add_recursive(Arc::new(MemFile::with_content(name.to_string(), data)), true);
    vfs.add_base_tree(".", base);
    vfs
}

#[test]
fn members_resolve_under_archive_path() {
    let data = build_zip(&[
        ("readme.txt", b"hello", false),
        ("assets/logo.bin", b"\x89LOGO", true),
    ]);
    let mut vfs = vfs_with_archive("pack.zip", data);

    let root = vfs.add_archive("pack.zip", None).unwrap();
    assert_eq!(root.full_path(), "pack.zip");

    let f = vfs.get_file("pack.zip/readme.txt").unwrap();
    assert_eq!(&read_all(f.as_ref()).unwrap()[..], b"hello");
    let f = vfs.get_file("pack.zip/assets/logo.bin").unwrap();
    assert_eq!(&read_all(f.as_ref()).unwrap()[..], b"\x89LOGO");
    assert!(vfs.get_dir("pack.zip/assets", false).is_some());

    // registered as a base tree under its own path
    assert!(vfs.base_tree("pack.zip").is_some());
}

#[test]
fn unrecognized_archive_is_an_error() {
    let mut vfs = vfs_with_archive("fake.zip", b"just text".to_vec());
    assert!(vfs.add_archive("fake.zip", None).is_err());
    assert!(vfs.add_archive("absent.zip", None).is_err());
}

#[test]
fn archive_overlays_like_any_directory() {
    let data = build_zip(&[("data/file.txt", b"Z", false)]);
    let mut vfs = vfs_with_archive("patch.zip", data);
    let base = vfs.root_dir();
    base.add_recursive(
        Arc::new(MemFile::with_content("data/file.txt", &b"plain"[..])),
        true,
    );

    vfs.add_archive("patch.zip", None).unwrap();
    // mount the archive's data dir over the plain one: archive wins
    vfs.mount("patch.zip/data", "data", true).unwrap();
    let f = vfs.get_file("data/file.txt").unwrap();
    assert_eq!(&read_all(f.as_ref()).unwrap()[..], b"Z");

    vfs.unmount("patch.zip/data", "data").unwrap();
    let f = vfs.get_file("data/file.txt").unwrap();
    assert_eq!(&read_all(f.as_ref()).unwrap()[..], b"plain");
}

#[test]
fn nested_archives_compose() {
    let inner = build_zip(&[("file.txt", b"innermost", false)]);
    let outer = build_zip(&[
        ("inner.zip", &inner, false),
        ("top.txt", b"outer", true),
    ]);
    let mut vfs = vfs_with_archive("outer.zip", outer);

    vfs.add_archive("outer.zip", None).unwrap();
    assert!(vfs.get_file("outer.zip/top.txt").is_some());

    // a member that is itself an archive can be opened in place
    vfs.add_archive("outer.zip/inner.zip", None).unwrap();
    let f = vfs.get_file("outer.zip/inner.zip/file.txt").unwrap();
    assert_eq!(&read_all(f.as_ref()).unwrap()[..], b"innermost");
}
