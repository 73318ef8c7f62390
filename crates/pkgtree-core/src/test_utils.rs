//! On-disk fixtures shared by the backend tests.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::{tempdir, TempDir};

pub(crate) fn write(root: &Path, file: &str, content: &str) {
    let path = root.join(file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A `testrepo` definition tree plus an installed ledger and world file,
/// all inside one temporary directory.
pub(crate) struct TestTree {
    _dir: TempDir,
    pub repo: PathBuf,
    pub installed: PathBuf,
    pub world: PathBuf,
}

const EBUILD: &str = "EAPI=8\n\nDESCRIPTION=\"Test package\"\nSLOT=\"0\"\nIUSE=\"test1 test2 test3 test4 test5 test6 test7\"\n\nsrc_install() {\n\tdefault\n}\n";

const OLD_EBUILD: &str = "EAPI=8\n\nsrc_install() {\n\tdosed -e 's/a/b/' \"${D}\"/etc/foo \n}\n";

const METADATA_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<pkgmetadata>\n</pkgmetadata>\n";

pub(crate) fn create_test_tree() -> TestTree {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("testrepo");
    let installed = dir.path().join("installed");
    let world = dir.path().join("world");

    write(&repo, "profiles/repo_name", "testrepo\n");
    write(&repo, "profiles/categories", "foo\nfoo1\nfoo2\nfoo3\nfoo4\n");
    write(&repo, "profiles/profiles.desc", "x86 testprofile stable\n");
    write(&repo, "profiles/use.desc", "test1 - A test use flag\ntest2 - Another test use flag\n");
    write(&repo, "profiles/use.local.desc", "foo/bar:test3 - A package-local flag\n");
    write(
        &repo,
        "profiles/thirdpartymirrors",
        "testmirror http://example.com/mirror http://example.org/mirror\n",
    );

    write(&repo, "profiles/base/make.defaults", "USE=\"test2\"\nCHOST=\"i686-pc-linux-gnu\"\n");
    write(&repo, "profiles/testprofile/parent", "../base\n");
    write(
        &repo,
        "profiles/testprofile/make.defaults",
        "ARCH=\"test\"\nUSE=\"test1 -test2\"\n",
    );
    write(&repo, "profiles/testprofile/package.use", "foo/bar test3\n");
    write(&repo, "profiles/testprofile/use.mask", "test5\n");
    write(&repo, "profiles/testprofile/use.force", "test6\n");
    write(&repo, "profiles/testprofile/package.use.force", "=foo/bar-2.0 test7\n");
    write(&repo, "profiles/testprofile/packages", "*foo/bar\n");
    write(&repo, "profiles/testprofile/virtuals", "virtual/bar foo/bar\n");

    write(&repo, "foo/bar/bar-1.0.ebuild", EBUILD);
    write(&repo, "foo/bar/bar-2.0.ebuild", EBUILD);
    write(&repo, "foo/bar/metadata.xml", METADATA_XML);
    write(&repo, "foo/bar/Manifest", "DIST bar-2.0.tar.gz 1024\n");
    write(&repo, "foo1/bar/bar-1.0.ebuild", EBUILD);
    write(&repo, "foo2/bar/bar-1.0.ebuild", OLD_EBUILD);
    write(&repo, "foo3/bar/bar-1.0.ebuild", EBUILD);
    write(&repo, "foo4/bar/bar-1.0.ebuild", EBUILD);

    write(
        &repo,
        "metadata/md5-cache/foo/bar-2.0",
        "DESCRIPTION=Test package\nIUSE=test1 test2 test3 test4 test5 test6 test7\nSLOT=0\nKEYWORDS=test\n",
    );
    write(&repo, "sets/testset.conf", "foo/bar\n>=foo1/bar-1.0\n");

    write(&installed, "foo/bar-1.0/USE", "test1\n");
    write(&installed, "foo/bar-1.0/IUSE", "test1 test2\n");
    write(&installed, "foo/bar-1.0/SLOT", "0\n");
    write(&installed, "foo/bar-1.0/REPOSITORY", "testrepo\n");
    write(&installed, "foo/bar-1.0/PROVIDE", "virtual/bar\n");
    write(&installed, "foo/bar-1.0/bar-1.0.ebuild", EBUILD);
    fs::write(&world, "foo/bar\n").unwrap();

    TestTree {
        _dir: dir,
        repo,
        installed,
        world,
    }
}
