use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use roletrando_core::content::{Question, QuestionLevel, WheelPhrase};

use crate::config::ContentConfig;

/// Name of the built-in theme compiled into the binary.
pub const BUILTIN_THEME: &str = "default";

const BUILTIN_WHEEL: &str = include_str!("../data/default/wheel.json");
const BUILTIN_QUIZ: &str = include_str!("../data/default/quiz.json");
const BUILTIN_MILLIONAIRE: &str = include_str!("../data/default/millionaire.json");

/// A multiple-choice question bank served over REST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Quiz,
    Millionaire,
}

impl Bank {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "quiz" => Some(Self::Quiz),
            "millionaire" => Some(Self::Millionaire),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::Millionaire => "millionaire",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Self::Quiz => "quiz.json",
            Self::Millionaire => "millionaire.json",
        }
    }
}

/// On-disk shape of `quiz.json` and `millionaire.json`.
#[derive(Debug, Deserialize)]
struct LevelsFile {
    levels: Vec<QuestionLevel>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Everything one theme offers.
#[derive(Debug, Clone, Default)]
pub struct ThemeContent {
    pub wheel: Vec<WheelPhrase>,
    pub quiz: Vec<QuestionLevel>,
    pub millionaire: Vec<QuestionLevel>,
}

impl ThemeContent {
    pub fn bank(&self, bank: Bank) -> &[QuestionLevel] {
        match bank {
            Bank::Quiz => &self.quiz,
            Bank::Millionaire => &self.millionaire,
        }
    }

    pub fn level(&self, bank: Bank, level: u32) -> Option<&QuestionLevel> {
        self.bank(bank).iter().find(|l| l.level == level)
    }

    pub fn question(&self, bank: Bank, level: u32, index: usize) -> Option<&Question> {
        self.level(bank, level)?.questions.get(index)
    }

    fn question_count(&self, bank: Bank) -> usize {
        self.bank(bank).iter().map(|l| l.questions.len()).sum()
    }
}

/// All themes known to the server, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ContentCatalog {
    themes: BTreeMap<String, Arc<ThemeContent>>,
    default_theme: String,
}

impl ContentCatalog {
    /// Only the compiled-in `default` theme.
    pub fn builtin() -> Self {
        let theme = ThemeContent {
            wheel: parse_builtin::<Vec<WheelPhrase>>("wheel.json", BUILTIN_WHEEL).unwrap_or_default(),
            quiz: parse_builtin::<LevelsFile>("quiz.json", BUILTIN_QUIZ)
                .map(|f| f.levels)
                .unwrap_or_default(),
            millionaire: parse_builtin::<LevelsFile>("millionaire.json", BUILTIN_MILLIONAIRE)
                .map(|f| f.levels)
                .unwrap_or_default(),
        };
        Self {
            themes: BTreeMap::from([(BUILTIN_THEME.to_string(), Arc::new(theme))]),
            default_theme: BUILTIN_THEME.to_string(),
        }
    }

    /// Built-in theme plus every theme directory under `data_dir`.
    pub fn load(config: &ContentConfig) -> Self {
        let mut catalog = Self::builtin();
        if let Some(dir) = &config.data_dir {
            catalog.load_dir(Path::new(dir));
        }
        if catalog.themes.contains_key(&config.default_theme) {
            catalog.default_theme = config.default_theme.clone();
        } else {
            tracing::warn!(
                theme = %config.default_theme,
                "Configured default theme not found, using built-in theme"
            );
        }
        for (name, theme) in &catalog.themes {
            tracing::info!(
                theme = %name,
                phrases = theme.wheel.len(),
                quiz_questions = theme.question_count(Bank::Quiz),
                millionaire_questions = theme.question_count(Bank::Millionaire),
                "Loaded theme"
            );
        }
        catalog
    }

    fn load_dir(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot read data directory");
                return;
            },
        };
        let base = self.builtin_theme();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_valid_theme_name(name) {
                tracing::warn!(dir = %path.display(), "Skipping theme with invalid name");
                continue;
            }
            let theme = load_theme_dir(&path, &base);
            self.themes.insert(name.to_string(), Arc::new(theme));
        }
    }

    fn builtin_theme(&self) -> Arc<ThemeContent> {
        self.themes
            .get(BUILTIN_THEME)
            .cloned()
            .unwrap_or_default()
    }

    /// Add or replace a theme.
    pub fn insert_theme(&mut self, name: &str, theme: ThemeContent) {
        self.themes.insert(name.to_string(), Arc::new(theme));
    }

    pub fn theme_names(&self) -> Vec<String> {
        self.themes.keys().cloned().collect()
    }

    pub fn default_theme(&self) -> &str {
        &self.default_theme
    }

    pub fn has_theme(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    /// Resolve a requested theme, falling back to the default for unknown
    /// or missing names. Returns the name actually used.
    pub fn resolve(&self, requested: Option<&str>) -> (String, Arc<ThemeContent>) {
        if let Some(name) = requested
            && let Some(theme) = self.themes.get(name)
        {
            return (name.to_string(), Arc::clone(theme));
        }
        if let Some(name) = requested {
            tracing::debug!(theme = name, "Unknown theme requested, using default");
        }
        let theme = self
            .themes
            .get(&self.default_theme)
            .cloned()
            .unwrap_or_default();
        (self.default_theme.clone(), theme)
    }
}

/// Theme names become URL path segments, so keep them plain.
pub fn is_valid_theme_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 32
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn parse_builtin<T: DeserializeOwned>(file: &str, body: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(file, error = %e, "Built-in content is malformed");
            None
        },
    }
}

/// Load a theme directory. Missing or broken files fall back to `base`.
fn load_theme_dir(dir: &Path, base: &ThemeContent) -> ThemeContent {
    let wheel = read_json_file::<Vec<WheelPhrase>>(&dir.join("wheel.json"));
    let quiz = read_json_file::<LevelsFile>(&dir.join(Bank::Quiz.file_name()));
    let millionaire = read_json_file::<LevelsFile>(&dir.join(Bank::Millionaire.file_name()));
    ThemeContent {
        wheel: or_base(wheel, || base.wheel.clone()),
        quiz: or_base(quiz.map(|r| r.map(|f| f.levels)), || base.quiz.clone()),
        millionaire: or_base(millionaire.map(|r| r.map(|f| f.levels)), || {
            base.millionaire.clone()
        }),
    }
}

/// `None` when the file does not exist.
fn read_json_file<T: DeserializeOwned>(path: &Path) -> Option<Result<T, ContentError>> {
    if !path.exists() {
        return None;
    }
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(source) => {
            return Some(Err(ContentError::Io {
                path: path.to_path_buf(),
                source,
            }));
        },
    };
    Some(serde_json::from_str(&body).map_err(|source| ContentError::Json {
        path: path.to_path_buf(),
        source,
    }))
}

fn or_base<T>(loaded: Option<Result<T, ContentError>>, base: impl FnOnce() -> T) -> T {
    match loaded {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Skipping content file");
            base()
        },
        None => base(),
    }
}
