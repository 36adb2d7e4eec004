use color_eyre::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File holding previously asked questions, one per line
pub const HISTORY_FILE: &str = "question_history.txt";

/// Registry of known cache files
const CACHE_FILES: &[&str] = &[HISTORY_FILE];

/// Manages cache directory and cache file operations
#[derive(Debug, Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Use an explicit cache directory (tests)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Clear all registered cache files
    pub fn clear_all(&self) -> Result<()> {
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    warn!(file = filename, error = %e, "could not remove cache file");
                }
            }
        }
        Ok(())
    }
}

/// Questions asked across sessions, oldest first
#[derive(Debug)]
pub struct QuestionHistory {
    cache: CacheManager,
    limit: usize,
    questions: Vec<String>,
}

impl QuestionHistory {
    /// Read the history file; a missing or unreadable file starts an empty history
    pub fn load(cache: CacheManager, limit: usize) -> Self {
        let path = cache.cache_file(HISTORY_FILE);
        let mut questions: Vec<String> = match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not read question history");
                Vec::new()
            }
        };
        if questions.len() > limit {
            questions.drain(..questions.len() - limit);
        }
        Self {
            cache,
            limit,
            questions,
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Record a question. Blank input and an immediate repeat are ignored.
    pub fn add(&mut self, question: &str) {
        let question = question.trim().replace('\n', " ");
        if question.is_empty() || self.questions.last() == Some(&question) {
            return;
        }
        self.questions.push(question);
        if self.questions.len() > self.limit {
            self.questions.remove(0);
        }
    }

    /// Write the history back, holding an exclusive lock while writing
    pub fn save(&self) -> Result<()> {
        self.cache.ensure_cache_dir()?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.cache.cache_file(HISTORY_FILE))?;
        if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
            warn!(error = %e, "could not lock question history");
        }
        for question in &self.questions {
            writeln!(file, "{}", question)?;
        }
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_history_round_trip_with_limit() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().join("datask"));
        let mut history = QuestionHistory::load(cache.clone(), 2);
        history.add("age of arun");
        history.add("age of arun");
        history.add("  ");
        history.add("list department");
        history.add("average salary");
        assert_eq!(history.questions(), ["list department", "average salary"]);
        history.save().unwrap();

        let reloaded = QuestionHistory::load(cache.clone(), 10);
        assert_eq!(reloaded.questions(), ["list department", "average salary"]);

        cache.clear_all().unwrap();
        assert!(QuestionHistory::load(cache, 10).questions().is_empty());
    }
}
