//! Destination routing for archive entries

use std::path::{Path, PathBuf};

/// Extension of script text files
pub const SCRIPT_EXTENSION: &str = "txt";

/// Root an archive entry is extracted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationRoot {
    Scripts,
    Data,
}

/// Pick the destination root for an entry name
///
/// Script text files go to the scripts root, everything else (packs
/// included) to the data root.
pub fn route(file_name: &str) -> DestinationRoot {
    let is_script = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION));

    if is_script {
        DestinationRoot::Scripts
    } else {
        DestinationRoot::Data
    }
}

/// Concrete directories behind each [`DestinationRoot`]
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationRoots {
    pub data: PathBuf,
    pub scripts: PathBuf,
}

impl DestinationRoots {
    pub fn new<D: Into<PathBuf>, S: Into<PathBuf>>(data: D, scripts: S) -> Self {
        Self {
            data: data.into(),
            scripts: scripts.into(),
        }
    }

    pub fn path_for(&self, root: DestinationRoot) -> &Path {
        match root {
            DestinationRoot::Data => &self.data,
            DestinationRoot::Scripts => &self.scripts,
        }
    }

    /// Route `file_name` and return the matching directory
    pub fn root_for(&self, file_name: &str) -> &Path {
        self.path_for(route(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_by_extension() {
        assert_eq!(route("user.script.txt"), DestinationRoot::Scripts);
        assert_eq!(route("campaign/READ.TXT"), DestinationRoot::Scripts);
        assert_eq!(route(r"scripts\x.Txt"), DestinationRoot::Scripts);
    }

    #[test]
    fn everything_else_is_data() {
        for name in ["mod.pack", "txt", "a.txt.bak", "folder/", "", ".txt", "noext"] {
            assert_eq!(route(name), DestinationRoot::Data, "{name}");
        }
    }

    #[test]
    fn roots_resolve() {
        let roots = DestinationRoots::new("/g/data", "/s");
        assert_eq!(roots.root_for("a.pack"), Path::new("/g/data"));
        assert_eq!(roots.root_for("a.txt"), Path::new("/s"));
    }
}
