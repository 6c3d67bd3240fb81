use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Most conversations kept in memory at once.
    pub max_sessions: usize,
    /// Conversations untouched for this long are forgotten.
    pub idle_minutes: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DataSettings {
    pub knowledge_file: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DialogueSettings {
    /// Only calendar entries dated in this year are shown.
    pub calendar_year: i32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub data: DataSettings,
    pub dialogue: DialogueSettings,
}

fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("session.cookie_name", "campus_chat_session")?
        .set_default("session.max_sessions", 10_000)?
        .set_default("session.idle_minutes", 30)?
        .set_default("data.knowledge_file", "data/university.json")?
        .set_default("dialogue.calendar_year", 2026)?)
}

impl Settings {
    /// Reads `<name>.toml` if present, then `CAMPUS_CHAT__SECTION__KEY` overrides.
    pub fn load(name: &str) -> Result<Self> {
        builder()?
            .add_source(config::File::with_name(name).required(false))
            .add_source(
                config::Environment::with_prefix("CAMPUS_CHAT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Built-in defaults only, with no file or environment lookups.
    pub fn defaults() -> Result<Self> {
        Ok(builder()?.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::defaults().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.dialogue.calendar_year, 2026);
        assert_eq!(settings.data.knowledge_file, "data/university.json");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load("does-not-exist").unwrap();
        assert_eq!(settings.session.cookie_name, "campus_chat_session");
        assert_eq!(settings.session.max_sessions, 10_000);
        assert_eq!(settings.session.idle_minutes, 30);
    }
}
