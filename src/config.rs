use std::collections::HashMap;
use std::fs;
use std::time::Duration;

/// INI-style configuration: global `key = value` pairs plus `[Section]`
/// blocks. Lines starting with `#` are comments. Values may be quoted.
#[derive(Debug, Default)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Error reading file {path}: {e}"))?;
        Ok(Self::parse(&content))
    }

    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                current_section = Some(name.to_string());
                continue;
            }

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    /// Typed accessor: u16 value, falling back to `default` when the key is
    /// missing or does not parse.
    #[must_use]
    pub fn get_u16(&self, section: &str, key: &str, default: u16) -> u16 {
        self.get(section, key)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_usize(&self, section: &str, key: &str, default: usize) -> usize {
        self.get(section, key)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    /// Typed accessor: a duration given in milliseconds.
    #[must_use]
    pub fn get_duration_ms(&self, section: &str, key: &str, default: Duration) -> Duration {
        self.get(section, key)
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
