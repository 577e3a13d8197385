//! Daily notes: one Markdown file per day under the workspace.

use std::path::PathBuf;

use parking_lot::Mutex;

use orion_domain::error::Result;

pub struct NotesWriter {
    notes_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl NotesWriter {
    pub fn new(workspace_root: impl Into<PathBuf>, notes_dir: &str) -> Self {
        Self {
            notes_dir: workspace_root.into().join(notes_dir),
            write_lock: Mutex::new(()),
        }
    }

    fn today_path(&self) -> PathBuf {
        let today = chrono::Utc::now().format("%Y-%m-%d");
        self.notes_dir.join(format!("{today}.md"))
    }

    /// Append a timestamped bullet to today's note, creating the file
    /// (with a date header) on first write of the day.
    pub fn append(&self, text: &str) -> Result<()> {
        use std::io::Write;
        let _guard = self.write_lock.lock();
        std::fs::create_dir_all(&self.notes_dir)?;

        let path = self.today_path();
        let is_new = !path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        if is_new {
            writeln!(file, "# {}\n", chrono::Utc::now().format("%Y-%m-%d"))?;
        }
        writeln!(file, "- {} {}", chrono::Utc::now().format("%H:%M"), text)?;
        Ok(())
    }

    pub fn read_today(&self) -> Result<String> {
        let path = self.today_path();
        if !path.exists() {
            return Ok(String::new());
        }
        Ok(std::fs::read_to_string(path)?)
    }
}
