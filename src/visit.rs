use crate::entry::{DirEntry, FileEntry, SpecialEntry};
use crate::manifest::Manifest;

/// Callbacks for walking a scanned tree without knowing its layout.
pub trait Visitor {
    fn file(&mut self, file: &FileEntry);
    fn special(&mut self, special: &SpecialEntry);
    /// Called before the directory's own entries are visited.
    fn dir(&mut self, dir: &DirEntry);
}

/// Visit files, then special entries, then each directory followed by its
/// subtree.
pub fn iterate(manifest: &Manifest, visitor: &mut impl Visitor) {
    for file in &manifest.files {
        visitor.file(file);
    }
    for special in &manifest.specials {
        visitor.special(special);
    }
    for dir in &manifest.dirs {
        visitor.dir(dir);
        if let Some(child) = &dir.manifest {
            iterate(child, visitor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Visitor for Recorder {
        fn file(&mut self, file: &FileEntry) {
            self.0.push(format!("f:{}", file.name));
        }
        fn special(&mut self, special: &SpecialEntry) {
            self.0.push(format!("s:{}", special.name));
        }
        fn dir(&mut self, dir: &DirEntry) {
            self.0.push(format!("d:{}", dir.name));
        }
    }

    fn file(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            ..FileEntry::default()
        }
    }

    #[test]
    fn test_preorder_files_before_directories() {
        let mut inner = Manifest::new();
        inner.files.push(file("inner.txt"));

        let mut root = Manifest::new();
        root.dirs.push(DirEntry {
            name: "a".to_string(),
            manifest: Some(Box::new(inner)),
            ..DirEntry::default()
        });
        root.dirs.push(DirEntry {
            name: "b".to_string(),
            ..DirEntry::default()
        });
        root.files.push(file("top.txt"));
        root.specials.push(SpecialEntry {
            name: "link".to_string(),
            ..SpecialEntry::default()
        });

        let mut recorder = Recorder::default();
        iterate(&root, &mut recorder);

        assert_eq!(
            recorder.0,
            vec!["f:top.txt", "s:link", "d:a", "f:inner.txt", "d:b"]
        );
    }
}
