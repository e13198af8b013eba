use stagecraft_build::CompileOptions;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(dead_code)]
pub const FIXTURE_PUBLIC: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIF5s+7JjIaRdTMlay1v17NSZSqKYuDpURc4AqzZ2oW+C fixture@stagecraft";

#[allow(dead_code)]
pub const SECOND_PUBLIC: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIMwCHJgsWCRdLNzUo5/d+miTbFQPzvTaogwt4RTc8Nl4 second@stagecraft";

/// 一時ディレクトリ上のプロジェクト（`<tmp>/demo`）と、鍵探索用のホーム
pub struct TestProject {
    _temp: TempDir,
    root: PathBuf,
    home: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("demo");
        let home = temp.path().join("home");
        fs::create_dir_all(root.join("installation")).unwrap();
        fs::create_dir_all(home.join(".ssh")).unwrap();
        Self {
            _temp: temp,
            root,
            home,
        }
    }

    pub fn write_config(&self, content: &str) {
        self.write("user_config.yml", content);
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// ssh-keygen の出力と同じく末尾に改行を付けて書く
    #[allow(dead_code)]
    pub fn write_home_key(&self, name: &str, content: &str) {
        fs::write(self.home.join(".ssh").join(name), format!("{}\n", content)).unwrap();
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    #[allow(dead_code)]
    pub fn home(&self) -> &Path {
        &self.home
    }

    #[allow(dead_code)]
    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.join(relative)).unwrap()
    }

    #[allow(dead_code)]
    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }

    pub fn options(&self) -> CompileOptions {
        CompileOptions::new(&self.root).with_home_dir(&self.home)
    }

    /// 生成物すべて（相対パス → 内容）
    #[allow(dead_code)]
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut files = Vec::new();
        collect(&self.root, &self.root, &mut files);
        files.sort();
        files
    }
}

fn collect(root: &Path, dir: &Path, files: &mut Vec<(String, String)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path.strip_prefix(root).unwrap().display().to_string();
            files.push((relative, fs::read_to_string(&path).unwrap()));
        }
    }
}
